//! Core engine for dependency-ordered network interface lifecycle
//! management.
//!
//! The engine brings named interfaces up or down through a sequence of
//! phases, recursively handling `requires` dependencies and tracking
//! how many dependents hold each interface up:
//!
//! - [`collection`]: insertion-ordered interface records for one run
//! - [`config`]: interfaces(5)-style configuration parsing
//! - [`resolver`]: dependent discovery, depth computation, reordering
//! - [`lifecycle`]: the phase-sequenced transition state machine
//! - [`state`]: the durable reference-counted state store
//! - [`execute`] / [`waiter`]: bounded subprocess execution
//! - [`environment`]: per-phase child environment construction
//!
//! # Example
//!
//! ```no_run
//! use rifup_core::{config, resolver, ExecuteOpts, InterfaceCollection, LifecycleEngine, StateStore};
//!
//! fn bring_up(name: &str) -> rifup_core::IfupResult<()> {
//!     let opts = ExecuteOpts::default();
//!     let mut collection = InterfaceCollection::standard();
//!     config::load(&opts.interfaces_file, &mut collection)?;
//!
//!     let mut state = StateStore::load(&opts.state_file)?;
//!     resolver::resolve(&opts, &mut collection)?;
//!     state.sync(&mut collection);
//!
//!     let engine = LifecycleEngine::new(&opts);
//!     engine.change(&mut collection, &mut state, name, None, true, true)?;
//!     state.save(&opts.state_file)
//! }
//! ```
//!
//! Actual configuration work is delegated to external executors and
//! shell commands; the engine itself never touches the network stack.

pub mod collection;
pub mod config;
pub mod environment;
pub mod error;
pub mod execute;
pub mod interface;
pub mod lifecycle;
pub mod lock;
pub mod options;
pub mod resolver;
pub mod state;
pub mod waiter;

// Re-export commonly used items at crate root
pub use collection::InterfaceCollection;
pub use error::{IfupError, IfupResult};
pub use interface::{Address, Interface, Vars};
pub use lifecycle::{LifecycleEngine, Phase};
pub use lock::StateLock;
pub use options::ExecuteOpts;
pub use state::{StateRecord, StateStore};
