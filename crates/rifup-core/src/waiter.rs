//! Child process wait strategies.
//!
//! The engine waits for children through a single [`ProcessWaiter`]
//! capability with two implementations: an event-driven waiter built
//! on a process-exit notification descriptor (Linux), and a portable
//! poller that checks exit status on a fixed cadence. The waiter is
//! selected once at startup.

use once_cell::sync::Lazy;
use std::io;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait.
#[derive(Debug)]
pub enum WaitVerdict {
    /// The child exited within the timeout.
    Exited(ExitStatus),
    /// The timeout elapsed; the child is still running and not reaped.
    TimedOut,
}

/// Bounded wait on a spawned child.
pub trait ProcessWaiter: Send + Sync {
    /// Waits up to `timeout` for `child` to exit. Does not kill or
    /// reap the child on timeout; that is the caller's decision.
    fn wait_timeout(&self, child: &mut Child, timeout: Duration) -> io::Result<WaitVerdict>;
}

const FINE_INTERVAL: Duration = Duration::from_millis(5);
const COARSE_INTERVAL: Duration = Duration::from_millis(100);
const FINE_WINDOW: Duration = Duration::from_millis(500);

/// Portable fallback: polls the exit status, fine-grained at first and
/// coarser afterward, until the timeout elapses.
#[derive(Debug, Default)]
pub struct PollWaiter;

impl ProcessWaiter for PollWaiter {
    fn wait_timeout(&self, child: &mut Child, timeout: Duration) -> io::Result<WaitVerdict> {
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(WaitVerdict::Exited(status));
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(WaitVerdict::TimedOut);
            }
            let interval = if elapsed < FINE_WINDOW {
                FINE_INTERVAL
            } else {
                COARSE_INTERVAL
            };
            std::thread::sleep(interval.min(timeout - elapsed));
        }
    }
}

/// Event-driven waiter using a pidfd, waking immediately on exit or
/// timeout. Falls back to polling when the kernel has no pidfd
/// support.
#[cfg(target_os = "linux")]
#[derive(Debug, Default)]
pub struct PidfdWaiter;

#[cfg(target_os = "linux")]
impl ProcessWaiter for PidfdWaiter {
    fn wait_timeout(&self, child: &mut Child, timeout: Duration) -> io::Result<WaitVerdict> {
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
        use std::os::fd::{AsFd, FromRawFd, OwnedFd, RawFd};

        let raw =
            unsafe { libc::syscall(libc::SYS_pidfd_open, child.id() as libc::pid_t, 0 as libc::c_uint) };
        if raw < 0 {
            return PollWaiter.wait_timeout(child, timeout);
        }
        let pidfd = unsafe { OwnedFd::from_raw_fd(raw as RawFd) };

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let millis = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);
            let poll_timeout = PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX);
            let mut fds = [PollFd::new(pidfd.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, poll_timeout) {
                Ok(0) => return Ok(WaitVerdict::TimedOut),
                Ok(_) => return Ok(WaitVerdict::Exited(child.wait()?)),
                Err(nix::errno::Errno::EINTR) => {
                    if Instant::now() >= deadline {
                        return Ok(WaitVerdict::TimedOut);
                    }
                }
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }
}

static DEFAULT_WAITER: Lazy<Box<dyn ProcessWaiter>> = Lazy::new(|| {
    #[cfg(target_os = "linux")]
    {
        Box::new(PidfdWaiter)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(PollWaiter)
    }
});

/// The waiter selected for this platform.
pub fn default_waiter() -> &'static dyn ProcessWaiter {
    &**DEFAULT_WAITER
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn_sh(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .spawn()
            .expect("spawn /bin/sh")
    }

    #[test]
    fn test_poll_waiter_sees_exit() {
        let mut child = spawn_sh("exit 7");
        match PollWaiter
            .wait_timeout(&mut child, Duration::from_secs(5))
            .unwrap()
        {
            WaitVerdict::Exited(status) => assert_eq!(status.code(), Some(7)),
            WaitVerdict::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn test_poll_waiter_times_out() {
        let mut child = spawn_sh("sleep 5");
        let start = Instant::now();
        match PollWaiter
            .wait_timeout(&mut child, Duration::from_millis(300))
            .unwrap()
        {
            WaitVerdict::TimedOut => {}
            WaitVerdict::Exited(_) => panic!("expected timeout"),
        }
        assert!(start.elapsed() < Duration::from_secs(3));
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_default_waiter_sees_exit() {
        let mut child = spawn_sh("exit 0");
        match default_waiter()
            .wait_timeout(&mut child, Duration::from_secs(5))
            .unwrap()
        {
            WaitVerdict::Exited(status) => assert!(status.success()),
            WaitVerdict::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pidfd_waiter_times_out() {
        let mut child = spawn_sh("sleep 5");
        match PidfdWaiter
            .wait_timeout(&mut child, Duration::from_millis(300))
            .unwrap()
        {
            WaitVerdict::TimedOut => {}
            WaitVerdict::Exited(_) => panic!("expected timeout"),
        }
        child.kill().unwrap();
        child.wait().unwrap();
    }
}
