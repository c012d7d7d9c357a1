//! Front end for the lifecycle engine: option parsing, target
//! selection, and the load → resolve → transition → persist flow.
//!
//! The binary is multi-call aware: installed (or hardlinked) as
//! `ifdown` it takes interfaces down by default; any other name brings
//! them up. `--up`/`--down` override either way.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;

use rifup_core::{
    config, resolver, ExecuteOpts, Interface, InterfaceCollection, LifecycleEngine, StateStore,
};

/// Bring network interfaces up or down in dependency order.
#[derive(Debug, Parser)]
#[command(name = "rifup", version, about)]
pub struct Cli {
    /// Use FILE for interface definitions.
    #[arg(short = 'i', long = "interfaces", value_name = "FILE")]
    pub interfaces: Option<PathBuf>,

    /// Use FILE for state.
    #[arg(short = 'S', long = "state-file", value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Only match interfaces marked 'auto'.
    #[arg(short = 'a', long = "auto")]
    pub auto: bool,

    /// Only match interfaces matching PATTERN.
    #[arg(short = 'I', long = "include", value_name = "PATTERN")]
    pub include: Option<String>,

    /// Never match interfaces matching PATTERN.
    #[arg(short = 'X', long = "exclude", value_name = "PATTERN")]
    pub exclude: Option<String>,

    /// Do not actually run any commands.
    #[arg(short = 'n', long = "no-act")]
    pub no_act: bool,

    /// Show what commands are being run.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Change state even for configured or erroneous interfaces.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Do not take the per-interface state lock.
    #[arg(long = "no-lock")]
    pub no_lock: bool,

    /// Directory searched for executors.
    #[arg(short = 'E', long = "executor-path", value_name = "DIR")]
    pub executor_path: Option<PathBuf>,

    /// Per-command timeout in seconds.
    #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Bring interfaces up (default unless invoked as ifdown).
    #[arg(long = "up", conflicts_with = "down")]
    pub up: bool,

    /// Take interfaces down.
    #[arg(long = "down")]
    pub down: bool,

    /// Print the resolved stanza for each target instead of acting.
    #[arg(short = 'q', long = "query")]
    pub query: bool,

    /// List the recorded state and exit.
    #[arg(long = "state")]
    pub show_state: bool,

    /// Interfaces to change (NAME, or NAME=STANZA to apply another
    /// stanza to NAME).
    #[arg(value_name = "INTERFACES")]
    pub targets: Vec<String>,
}

impl Cli {
    /// Builds the engine options from flags and defaults.
    pub fn execute_opts(&self) -> ExecuteOpts {
        let defaults = ExecuteOpts::default();
        ExecuteOpts {
            verbose: self.verbose,
            mock: self.no_act,
            force: self.force,
            no_lock: self.no_lock,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            executor_path: self
                .executor_path
                .clone()
                .unwrap_or(defaults.executor_path),
            interfaces_file: self.interfaces.clone().unwrap_or(defaults.interfaces_file),
            state_file: self.state_file.clone().unwrap_or(defaults.state_file),
            addon_root: defaults.addon_root,
        }
    }

    /// The requested direction, from flags or the program name.
    pub fn direction_is_up(&self) -> bool {
        if self.down {
            return false;
        }
        if self.up {
            return true;
        }
        !program_is_ifdown()
    }
}

fn program_is_ifdown() -> bool {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().contains("ifdown"))
        .unwrap_or(false)
}

/// Splits a target argument into `(ifname, stanza)`: `eth0=wlan0`
/// configures `eth0` using the `wlan0` stanza.
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('=') {
        Some((ifname, stanza)) => (ifname, Some(stanza)),
        None => (target, None),
    }
}

fn compile_pattern(pattern: Option<&str>) -> Result<Option<glob::Pattern>> {
    match pattern {
        Some(p) => Ok(Some(
            glob::Pattern::new(p).with_context(|| format!("invalid pattern '{p}'"))?,
        )),
        None => Ok(None),
    }
}

/// Runs one invocation end to end.
pub fn run(cli: &Cli) -> Result<()> {
    let up = cli.direction_is_up();
    let opts = cli.execute_opts();

    let mut state = StateStore::load(&opts.state_file)?;
    if cli.show_state {
        print!("{}", state.serialize());
        return Ok(());
    }

    let mut collection = InterfaceCollection::standard();
    config::load(&opts.interfaces_file, &mut collection)
        .with_context(|| format!("could not parse {}", opts.interfaces_file.display()))?;

    resolver::resolve(&opts, &mut collection).context("could not validate dependency tree")?;
    state.sync(&mut collection);

    if cli.query {
        return query(cli, &collection);
    }

    let engine = LifecycleEngine::new(&opts);
    if cli.auto {
        let include = compile_pattern(cli.include.as_deref())?;
        let exclude = compile_pattern(cli.exclude.as_deref())?;
        for name in collection.names() {
            let (is_auto, is_template) = match collection.get(&name) {
                Some(iface) => (iface.is_auto, iface.is_template),
                None => continue,
            };
            if !is_auto || is_template {
                continue;
            }
            if let Some(pattern) = &exclude {
                if pattern.matches(&name) {
                    continue;
                }
            }
            if let Some(pattern) = &include {
                if !pattern.matches(&name) {
                    continue;
                }
            }
            engine
                .change(&mut collection, &mut state, &name, None, up, false)
                .with_context(|| change_failure(&name, up))?;
        }
    } else {
        if cli.targets.is_empty() {
            bail!("no interfaces specified (use --auto to match 'auto' interfaces)");
        }
        for target in &cli.targets {
            let (ifname, stanza) = split_target(target);
            engine
                .change(&mut collection, &mut state, ifname, stanza, up, true)
                .with_context(|| change_failure(ifname, up))?;
        }
    }

    if !opts.mock {
        state.save(&opts.state_file)?;
    } else {
        debug!("mock mode, state file left untouched");
    }
    Ok(())
}

fn change_failure(ifname: &str, up: bool) -> String {
    format!(
        "failed to change interface {} state to '{}'",
        ifname,
        if up { "up" } else { "down" }
    )
}

fn query(cli: &Cli, collection: &InterfaceCollection) -> Result<()> {
    if cli.targets.is_empty() {
        bail!("no interfaces specified");
    }
    for target in &cli.targets {
        let (ifname, stanza) = split_target(target);
        let name = stanza.unwrap_or(ifname);
        let Some(iface) = collection.get(name) else {
            bail!("interface '{name}' is not defined");
        };
        print_stanza(iface);
    }
    Ok(())
}

/// Prints an interface stanza in configuration-file form.
fn print_stanza(iface: &Interface) {
    if iface.is_auto {
        println!("auto {}", iface.ifname);
    }
    let keyword = if iface.is_template { "template" } else { "iface" };
    println!("{} {}", keyword, iface.ifname);
    for (key, value) in iface.vars.iter() {
        println!("  {key} {value}");
    }
    println!();
}
