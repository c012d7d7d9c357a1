//! Interface lifecycle: phase-sequenced transitions with recursive
//! dependent handling and reference counting.
//!
//! Bringing an interface up runs its dependents up first, then its own
//! phases in order (create, pre-up, up, post-up), then takes a state
//! reference. Taking it down runs its own phases (pre-down, down,
//! post-down, destroy), then walks dependents, then drops the
//! reference. A dependent is only actually reconfigured when the
//! refcount update shows nobody else needs it.

use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::collection::InterfaceCollection;
use crate::environment::{self, Environment};
use crate::error::{IfupError, IfupResult};
use crate::execute;
use crate::interface::Interface;
use crate::lock::StateLock;
use crate::options::ExecuteOpts;
use crate::state::StateStore;

/// One named step of the up/down sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Create,
    PreUp,
    Up,
    PostUp,
    PreDown,
    Down,
    PostDown,
    Destroy,
    /// Dependent query, never part of a transition sequence.
    Depend,
}

impl Phase {
    /// Phases run when bringing an interface up, in order.
    pub const UP_SEQUENCE: [Phase; 4] = [Phase::Create, Phase::PreUp, Phase::Up, Phase::PostUp];

    /// Phases run when taking an interface down, in order.
    pub const DOWN_SEQUENCE: [Phase; 4] =
        [Phase::PreDown, Phase::Down, Phase::PostDown, Phase::Destroy];

    /// The phase name as exported to children and used as the
    /// free-form command variable key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::PreUp => "pre-up",
            Phase::Up => "up",
            Phase::PostUp => "post-up",
            Phase::PreDown => "pre-down",
            Phase::Down => "down",
            Phase::PostDown => "post-down",
            Phase::Destroy => "destroy",
            Phase::Depend => "depend",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives interface transitions for one run.
pub struct LifecycleEngine<'a> {
    opts: &'a ExecuteOpts,
}

impl<'a> LifecycleEngine<'a> {
    /// Creates an engine over the run's options.
    pub fn new(opts: &'a ExecuteOpts) -> Self {
        Self { opts }
    }

    /// Changes `ifname` to up or down, using the stanza named
    /// `cfgname` (defaults to `ifname` itself; `ifup eth0=wlan0`
    /// applies the `wlan0` stanza to `eth0`).
    ///
    /// Returns `Ok(false)` when the interface was skipped rather than
    /// transitioned (already in the requested state, or carrying
    /// configuration errors without `force`).
    pub fn change(
        &self,
        collection: &mut InterfaceCollection,
        state: &mut StateStore,
        ifname: &str,
        cfgname: Option<&str>,
        up: bool,
        explicit: bool,
    ) -> IfupResult<bool> {
        let cfgname = cfgname.unwrap_or(ifname);
        let Some(iface) = collection.get_mut(cfgname) else {
            return Err(IfupError::unknown_interface(cfgname));
        };

        if !self.opts.force {
            if up && iface.refcount > 0 {
                info!(interface = ifname, "interface already configured");
                return Ok(false);
            }
            if !up && iface.refcount == 0 {
                info!(interface = ifname, "interface not configured");
                return Ok(false);
            }
        }
        if up && explicit {
            iface.is_explicit = true;
        }

        info!(
            interface = ifname,
            direction = if up { "up" } else { "down" },
            "changing interface state"
        );
        self.run(collection, state, cfgname, Some(ifname), up)
    }

    /// Recursive transition entry. Dependents referenced before their
    /// own definition get placeholder records here.
    fn run(
        &self,
        collection: &mut InterfaceCollection,
        state: &mut StateStore,
        cfgname: &str,
        lifname: Option<&str>,
        up: bool,
    ) -> IfupResult<bool> {
        let lifname = lifname.unwrap_or(cfgname).to_string();
        {
            let iface = collection.find_or_create(cfgname);
            if iface.is_template {
                return Err(IfupError::template(cfgname));
            }
            // cycle guard: a name already being transitioned
            // short-circuits successfully
            if iface.is_pending {
                return Ok(true);
            }
            if iface.has_config_error {
                if !self.opts.force {
                    warn!(
                        interface = cfgname,
                        "skipping interface with configuration errors"
                    );
                    return Ok(false);
                }
                warn!(
                    interface = cfgname,
                    "interface has configuration errors, proceeding anyway"
                );
            }
            iface.is_pending = true;
        }

        let result = self.transition(collection, state, cfgname, &lifname, up);

        // the pending flag never leaks past a traversal, even on error
        if let Some(iface) = collection.get_mut(cfgname) {
            iface.is_pending = false;
        }
        result.map(|()| true)
    }

    fn transition(
        &self,
        collection: &mut InterfaceCollection,
        state: &mut StateStore,
        cfgname: &str,
        lifname: &str,
        up: bool,
    ) -> IfupResult<()> {
        let _lock = StateLock::acquire(self.opts, lifname)?;

        if up {
            // dependents go up first
            self.handle_dependents(collection, state, cfgname, up)?;
            for phase in Phase::UP_SEQUENCE {
                if let Some(iface) = collection.get(cfgname) {
                    self.run_phase(iface, phase, lifname, up)?;
                }
            }
            if let Some(iface) = collection.get_mut(cfgname) {
                state.ref_if(lifname, iface);
            }
        } else {
            for phase in Phase::DOWN_SEQUENCE {
                if let Some(iface) = collection.get(cfgname) {
                    self.run_phase(iface, phase, lifname, up)?;
                }
            }
            // dependents go down last
            self.handle_dependents(collection, state, cfgname, up)?;
            if let Some(iface) = collection.get_mut(cfgname) {
                state.unref_if(lifname, iface);
            }
        }
        Ok(())
    }

    /// Walks the interface's `requires` list, adjusting each
    /// dependent's refcount and recursing only where the dependent
    /// actually needs a transition.
    fn handle_dependents(
        &self,
        collection: &mut InterfaceCollection,
        state: &mut StateStore,
        cfgname: &str,
        up: bool,
    ) -> IfupResult<()> {
        let requires = match collection.get(cfgname) {
            Some(iface) => iface.requires(),
            None => return Ok(()),
        };

        for dep in requires {
            let skip = {
                let iface = collection.find_or_create(&dep);
                Self::handle_refcounting(state, &dep, iface, up)
            };
            if skip {
                debug!(
                    parent = cfgname,
                    dependent = %dep,
                    "dependent needs no transition"
                );
                continue;
            }
            debug!(
                parent = cfgname,
                dependent = %dep,
                direction = if up { "up" } else { "down" },
                "changing dependent interface state"
            );
            self.run(collection, state, &dep, None, up)?;
        }
        Ok(())
    }

    /// Adjusts a dependent's refcount for the transition direction.
    /// Returns true when no recursion is needed: going up it was
    /// already configured (prior count > 0); going down it is still
    /// referenced by other parents (resulting count > 1) or was
    /// brought up explicitly.
    fn handle_refcounting(
        state: &mut StateStore,
        name: &str,
        iface: &mut Interface,
        up: bool,
    ) -> bool {
        let prior = iface.refcount;
        if up {
            state.ref_if(name, iface);
        } else {
            state.unref_if(name, iface);
        }

        if up && prior > 0 {
            return true;
        }
        if !up && iface.refcount > 1 {
            return true;
        }
        if !up && iface.is_explicit {
            return true;
        }
        false
    }

    /// Runs one phase for one interface: its executors (declaration
    /// order going up, reverse going down), then the free-form
    /// commands whose variable key equals the phase name, then any
    /// addon scripts. Executor and command failures abort the
    /// transition; addon scripts are best-effort.
    pub fn run_phase(
        &self,
        iface: &Interface,
        phase: Phase,
        lifname: &str,
        up: bool,
    ) -> IfupResult<()> {
        let env = environment::build(self.opts, iface, lifname, phase, up);
        debug!(interface = lifname, phase = %phase, "running phase");

        let mut executors: Vec<&str> = iface.executors().collect();
        if !up {
            executors.reverse();
        }
        for executor in executors {
            execute::run_executor(self.opts, &env, executor)?;
        }

        for cmd in iface.vars.get_all(phase.as_str()) {
            execute::run_command(self.opts, &env, cmd)?;
        }

        self.run_addon_scripts(&env, phase);
        Ok(())
    }

    /// Runs every executable in `<addon-root>/if-<phase>.d/`, sorted by
    /// name. Failures are logged and never fail the transition.
    fn run_addon_scripts(&self, env: &Environment, phase: Phase) {
        let Some(root) = &self.opts.addon_root else {
            return;
        };
        let dir = root.join(format!("if-{}.d", phase.as_str()));
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return;
        };
        let mut scripts: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| execute::file_is_executable(p))
            .collect();
        scripts.sort();

        for script in scripts {
            let cmd = script.display().to_string();
            if let Err(e) = execute::run_command(self.opts, env, &cmd) {
                warn!(script = %cmd, error = %e, "addon script failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Create.as_str(), "create");
        assert_eq!(Phase::PreUp.as_str(), "pre-up");
        assert_eq!(Phase::PostDown.as_str(), "post-down");
        assert_eq!(Phase::Depend.to_string(), "depend");
    }

    #[test]
    fn test_phase_sequences() {
        let up: Vec<&str> = Phase::UP_SEQUENCE.iter().map(Phase::as_str).collect();
        assert_eq!(up, vec!["create", "pre-up", "up", "post-up"]);
        let down: Vec<&str> = Phase::DOWN_SEQUENCE.iter().map(Phase::as_str).collect();
        assert_eq!(down, vec!["pre-down", "down", "post-down", "destroy"]);
    }

    #[test]
    fn test_refcounting_up_skips_configured() {
        let mut state = StateStore::new();
        let mut iface = Interface::new("br0");

        // first parent: transition needed
        assert!(!LifecycleEngine::handle_refcounting(
            &mut state, "br0", &mut iface, true
        ));
        assert_eq!(iface.refcount, 1);

        // second parent: already configured
        assert!(LifecycleEngine::handle_refcounting(
            &mut state, "br0", &mut iface, true
        ));
        assert_eq!(iface.refcount, 2);
    }

    #[test]
    fn test_refcounting_down_waits_for_last_parent() {
        let mut state = StateStore::new();
        let mut iface = Interface::new("br0");
        iface.refcount = 3;
        state.upsert("br0", &iface);

        // two parents remain: too soon
        assert!(LifecycleEngine::handle_refcounting(
            &mut state, "br0", &mut iface, false
        ));
        assert_eq!(iface.refcount, 2);

        // last foreign reference gone: tear it down
        assert!(!LifecycleEngine::handle_refcounting(
            &mut state, "br0", &mut iface, false
        ));
        assert_eq!(iface.refcount, 1);
    }

    #[test]
    fn test_refcounting_down_spares_explicit() {
        let mut state = StateStore::new();
        let mut iface = Interface::new("br0");
        iface.refcount = 2;
        iface.is_explicit = true;
        state.upsert("br0", &iface);

        assert!(LifecycleEngine::handle_refcounting(
            &mut state, "br0", &mut iface, false
        ));
        assert_eq!(iface.refcount, 1);
        assert!(state.contains("br0"));
    }
}
