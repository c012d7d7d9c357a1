//! Execution options shared by every layer.

use std::path::PathBuf;

/// Default per-command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default executor search path.
pub const DEFAULT_EXECUTOR_PATH: &str = "/usr/libexec/rifup";

/// Default interface definitions file.
pub const DEFAULT_INTERFACES_FILE: &str = "/etc/network/interfaces";

/// Default state file.
pub const DEFAULT_STATE_FILE: &str = "/run/ifstate";

/// Default root for addon-script directories (`if-<phase>.d`).
pub const DEFAULT_ADDON_ROOT: &str = "/etc/network";

/// Options for one run of the engine.
///
/// Built once by the front end and passed by shared reference through
/// every layer; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExecuteOpts {
    /// Log every command being run.
    pub verbose: bool,

    /// Log commands without spawning anything.
    pub mock: bool,

    /// Transition interfaces that are already configured or carry
    /// configuration errors.
    pub force: bool,

    /// Skip the per-interface state lock.
    pub no_lock: bool,

    /// Per-command timeout in seconds; expired children are killed.
    pub timeout: u64,

    /// Directory searched for executors named in `use` variables.
    pub executor_path: PathBuf,

    /// The interface definitions file, exported to children as
    /// `INTERFACES_FILE`.
    pub interfaces_file: PathBuf,

    /// The state file recording configured interfaces and refcounts.
    pub state_file: PathBuf,

    /// Root directory holding `if-<phase>.d` addon-script directories;
    /// `None` disables addon scripts entirely.
    pub addon_root: Option<PathBuf>,
}

impl Default for ExecuteOpts {
    fn default() -> Self {
        Self {
            verbose: false,
            mock: false,
            force: false,
            no_lock: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            executor_path: PathBuf::from(DEFAULT_EXECUTOR_PATH),
            interfaces_file: PathBuf::from(DEFAULT_INTERFACES_FILE),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            addon_root: Some(PathBuf::from(DEFAULT_ADDON_ROOT)),
        }
    }
}
