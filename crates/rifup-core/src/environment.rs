//! Child process environment construction.
//!
//! Every spawned command and executor receives a purpose-built
//! environment describing the interface being changed: the well-known
//! `IFACE`/`PHASE`/`MODE`/`METHOD` variables plus one `IF_<KEY>` entry
//! per configuration variable. Children do not inherit the caller's
//! environment; a fixed `PATH` is provided instead.

use crate::interface::Interface;
use crate::lifecycle::Phase;
use crate::options::ExecuteOpts;

/// Name/value pairs handed to a spawned process.
pub type Environment = Vec<(String, String)>;

/// `PATH` exported to every child.
pub const CHILD_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Maps a variable key to its environment name: `IF_` prefix,
/// uppercased, hyphens become underscores.
fn env_key(key: &str) -> String {
    let mapped: String = key
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    format!("IF_{mapped}")
}

fn push_once(env: &mut Environment, name: &str, value: &str) {
    if !env.iter().any(|(k, _)| k == name) {
        env.push((name.to_string(), value.to_string()));
    }
}

/// Builds the full environment for one phase of one interface.
pub fn build(
    opts: &ExecuteOpts,
    iface: &Interface,
    lifname: &str,
    phase: Phase,
    up: bool,
) -> Environment {
    let mut env = Environment::new();

    env.push(("IFACE".to_string(), lifname.to_string()));
    env.push(("PHASE".to_string(), phase.as_str().to_string()));

    let mode = if phase == Phase::Depend {
        "depend"
    } else if up {
        "start"
    } else {
        "stop"
    };
    env.push(("MODE".to_string(), mode.to_string()));
    env.push(("METHOD".to_string(), iface.method().to_string()));

    if opts.verbose {
        env.push(("VERBOSE".to_string(), "1".to_string()));
    }
    env.push((
        "INTERFACES_FILE".to_string(),
        opts.interfaces_file.display().to_string(),
    ));
    env.push(("PATH".to_string(), CHILD_PATH.to_string()));

    let addresses: Vec<String> = iface.addresses().iter().map(ToString::to_string).collect();
    if let Some(first) = addresses.first() {
        env.push(("IF_ADDRESS".to_string(), first.clone()));
        env.push(("IF_ADDRESSES".to_string(), addresses.join(" ")));
    }

    let gateways = iface.gateways();
    if let Some(first) = gateways.first() {
        env.push(("IF_GATEWAY".to_string(), (*first).to_string()));
        env.push(("IF_GATEWAYS".to_string(), gateways.join(" ")));
    }

    let requires = iface.requires();
    if !requires.is_empty() {
        let joined = requires.join(" ");
        if iface.is_bridge {
            env.push(("IF_BRIDGE_PORTS".to_string(), joined.clone()));
        }
        if iface.is_bond {
            env.push(("IF_BOND_SLAVES".to_string(), joined));
        }
    }

    for (key, value) in iface.vars.iter() {
        // addresses and gateways were folded into the list variables
        if key == "address" || key == "gateway" {
            continue;
        }
        push_once(&mut env, &env_key(key), value);
    }

    env
}
