//! Subprocess execution for phase commands and executors.
//!
//! Commands run through `/bin/sh -c` with a purpose-built environment
//! and a bounded wall-clock wait; expired children are killed and
//! reaped. In mock mode nothing is spawned and every call reports
//! success after logging.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::error::{IfupError, IfupResult};
use crate::options::ExecuteOpts;
use crate::waiter::{default_waiter, WaitVerdict};

/// Shell used for every command line.
pub const SHELL: &str = "/bin/sh";

/// Characters that need escaping inside shell double-quotes:
/// $, `, ", \, and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("invalid regex pattern"));

/// Quotes a string for safe interpolation into a shell command line.
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{escaped}\"")
}

/// Whether `path` is a regular file with an executable bit set.
pub fn file_is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn spawn_shell(env: &Environment, cmd: &str, capture: bool) -> IfupResult<Child> {
    let mut command = Command::new(SHELL);
    command
        .arg("-c")
        .arg(cmd)
        .env_clear()
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if capture {
        command.stdout(Stdio::piped());
    }
    command.spawn().map_err(|e| IfupError::spawn(cmd, e))
}

fn wait_for(child: &mut Child, cmd: &str, timeout: u64) -> IfupResult<()> {
    match default_waiter().wait_timeout(child, Duration::from_secs(timeout)) {
        Ok(WaitVerdict::Exited(status)) => {
            if status.success() {
                Ok(())
            } else {
                Err(IfupError::command_failed(cmd, status.code().unwrap_or(-1)))
            }
        }
        Ok(WaitVerdict::TimedOut) => {
            warn!(command = %cmd, timeout, "command timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            Err(IfupError::timeout(cmd, timeout))
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(IfupError::spawn(cmd, e))
        }
    }
}

/// Runs a shell command line with the given environment.
pub fn run_command(opts: &ExecuteOpts, env: &Environment, cmd: &str) -> IfupResult<()> {
    if opts.verbose {
        info!(command = %cmd, "executing");
    } else {
        debug!(command = %cmd, "executing");
    }
    if opts.mock {
        return Ok(());
    }
    let mut child = spawn_shell(env, cmd, false)?;
    wait_for(&mut child, cmd, opts.timeout)
}

/// Runs a shell command line and returns the first line of its
/// standard output, if any.
pub fn run_command_capture(
    opts: &ExecuteOpts,
    env: &Environment,
    cmd: &str,
) -> IfupResult<Option<String>> {
    debug!(command = %cmd, "executing with capture");
    if opts.mock {
        return Ok(None);
    }
    let mut child = spawn_shell(env, cmd, true)?;
    let stdout = child.stdout.take();
    wait_for(&mut child, cmd, opts.timeout)?;

    let mut line = String::new();
    if let Some(out) = stdout {
        let _ = BufReader::new(out).read_line(&mut line);
    }
    let line = line.trim();
    Ok(if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    })
}

/// Runs the named executor if it exists under the executor search
/// path. A missing or non-executable executor is silently skipped;
/// a present one that fails is an error. Returns whether it ran.
pub fn run_executor(opts: &ExecuteOpts, env: &Environment, name: &str) -> IfupResult<bool> {
    let path = opts.executor_path.join(name);
    if !file_is_executable(&path) {
        debug!(executor = %name, "executor not present, skipping");
        return Ok(false);
    }
    run_command(opts, env, &path.display().to_string())?;
    Ok(true)
}

/// Runs the named executor for a dependent query and returns the first
/// line it printed. A nonzero exit is tolerated here (the query just
/// yields nothing); only a spawn failure or timeout is an error.
pub fn run_executor_capture(
    opts: &ExecuteOpts,
    env: &Environment,
    name: &str,
) -> IfupResult<Option<String>> {
    let path = opts.executor_path.join(name);
    if !file_is_executable(&path) {
        debug!(executor = %name, "executor not present, skipping");
        return Ok(None);
    }
    match run_command_capture(opts, env, &path.display().to_string()) {
        Ok(line) => Ok(line),
        Err(IfupError::CommandFailed { command, code }) => {
            debug!(command = %command, code, "executor reported no dependents");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    fn opts_with_timeout(timeout: u64) -> ExecuteOpts {
        ExecuteOpts {
            timeout,
            ..ExecuteOpts::default()
        }
    }

    #[test]
    fn test_shellquote_simple() {
        assert_eq!(shellquote("simple"), "\"simple\"");
        assert_eq!(shellquote("eth0"), "\"eth0\"");
    }

    #[test]
    fn test_shellquote_special_chars() {
        assert_eq!(shellquote("$HOME"), "\"\\$HOME\"");
        assert_eq!(shellquote("`whoami`"), "\"\\`whoami\\`\"");
        assert_eq!(shellquote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(shellquote("path\\to"), "\"path\\\\to\"");
    }

    #[test]
    fn test_run_command_success_and_failure() {
        let opts = opts_with_timeout(5);
        let env = Environment::new();
        assert!(run_command(&opts, &env, "true").is_ok());

        match run_command(&opts, &env, "exit 42") {
            Err(IfupError::CommandFailed { code, .. }) => assert_eq!(code, 42),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_run_command_mock_spawns_nothing() {
        let opts = ExecuteOpts {
            mock: true,
            ..ExecuteOpts::default()
        };
        let env = Environment::new();
        // even a failing command reports success in mock mode
        assert!(run_command(&opts, &env, "exit 1").is_ok());
    }

    #[test]
    fn test_run_command_timeout_kills() {
        let opts = opts_with_timeout(1);
        let env = Environment::new();
        let start = Instant::now();
        match run_command(&opts, &env, "sleep 30") {
            Err(IfupError::CommandTimeout { timeout, .. }) => assert_eq!(timeout, 1),
            other => panic!("expected CommandTimeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_run_command_near_timeout_succeeds() {
        let opts = opts_with_timeout(5);
        let env = Environment::new();
        assert!(run_command(&opts, &env, "sleep 0.2").is_ok());
    }

    #[test]
    fn test_run_command_capture_first_line() {
        let opts = opts_with_timeout(5);
        let env = Environment::new();
        let line = run_command_capture(&opts, &env, "printf 'eth1 eth2\\nmore\\n'").unwrap();
        assert_eq!(line.as_deref(), Some("eth1 eth2"));

        let line = run_command_capture(&opts, &env, "true").unwrap();
        assert_eq!(line, None);
    }

    #[test]
    fn test_command_env_is_exactly_what_was_given() {
        let opts = opts_with_timeout(5);
        let env: Environment = vec![("IFACE".to_string(), "eth0".to_string())];
        let line = run_command_capture(&opts, &env, "echo $IFACE-$HOME").unwrap();
        assert_eq!(line.as_deref(), Some("eth0-"));
    }

    fn write_executor(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\n{body}").unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    #[test]
    fn test_missing_executor_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };
        let env = Environment::new();
        assert_eq!(run_executor(&opts, &env, "no-such-executor").unwrap(), false);
    }

    #[test]
    fn test_present_failing_executor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_executor(dir.path(), "failing", "exit 1");
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };
        let env = Environment::new();
        assert!(run_executor(&opts, &env, "failing").is_err());
        // the depend-query variant tolerates the nonzero exit
        assert_eq!(run_executor_capture(&opts, &env, "failing").unwrap(), None);
    }

    #[test]
    fn test_non_executable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain"), "not a script").unwrap();
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };
        let env = Environment::new();
        assert_eq!(run_executor(&opts, &env, "plain").unwrap(), false);
    }

    #[test]
    fn test_executor_capture_reports_dependents() {
        let dir = tempfile::tempdir().unwrap();
        write_executor(dir.path(), "bridge", "echo eth1 eth2");
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };
        let env = Environment::new();
        let line = run_executor_capture(&opts, &env, "bridge").unwrap();
        assert_eq!(line.as_deref(), Some("eth1 eth2"));
    }

    #[test]
    fn test_file_is_executable() {
        let dir = tempfile::tempdir().unwrap();
        write_executor(dir.path(), "yes", "true");
        std::fs::write(dir.path().join("no"), "x").unwrap();
        assert!(file_is_executable(&dir.path().join("yes")));
        assert!(!file_is_executable(&dir.path().join("no")));
        assert!(!file_is_executable(&dir.path().join("absent")));
        assert!(!file_is_executable(dir.path()));
    }
}
