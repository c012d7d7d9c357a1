//! Dependency resolution: merging executor-reported dependents into
//! the `requires` graph, computing per-interface dependency depth, and
//! reordering the collection so deeper interfaces iterate first.

use std::collections::HashSet;
use tracing::debug;

use crate::collection::InterfaceCollection;
use crate::environment;
use crate::error::{IfupError, IfupResult};
use crate::execute;
use crate::lifecycle::Phase;
use crate::options::ExecuteOpts;

/// Merges the interface's declared `requires` entries with dependents
/// reported by each of its executors (invoked for the `depend` phase),
/// de-duplicates, and rewrites `requires` to the single merged value.
///
/// An executor that is missing or exits nonzero contributes nothing;
/// an executor that cannot be invoked at all aborts resolution. Mock
/// mode skips the executors and only merges the static entries.
pub fn query_dependents(
    opts: &ExecuteOpts,
    collection: &mut InterfaceCollection,
    name: &str,
) -> IfupResult<()> {
    let Some(iface) = collection.get(name) else {
        return Ok(());
    };
    let mut merged = iface.requires();

    if !opts.mock {
        let executors: Vec<String> = iface.executors().map(str::to_string).collect();
        if !executors.is_empty() {
            let env = environment::build(opts, iface, name, Phase::Depend, true);
            for executor in &executors {
                let reported = execute::run_executor_capture(opts, &env, executor).map_err(|e| {
                    IfupError::DependencyQuery {
                        iface: name.to_string(),
                        source: Box::new(e),
                    }
                })?;
                let Some(line) = reported else { continue };
                debug!(interface = name, executor = %executor, dependents = %line,
                    "executor reported dependents");
                for token in line.split_whitespace() {
                    if !merged.iter().any(|t| t == token) {
                        merged.push(token.to_string());
                    }
                }
            }
        }
    }

    if !merged.is_empty() {
        if let Some(iface) = collection.get_mut(name) {
            iface.vars.set_single("requires", merged.join(" "));
        }
    }
    Ok(())
}

/// Computes `rdepends_count` for every interface: the number of hops
/// below the deepest reachable leaf of its `requires` chain. Cycles
/// are broken silently; a name already being visited contributes
/// depth 0. Dependent queries run first and abort on failure.
pub fn count_rdepends(opts: &ExecuteOpts, collection: &mut InterfaceCollection) -> IfupResult<()> {
    for name in collection.names() {
        query_dependents(opts, collection, &name)?;
    }
    for name in collection.names() {
        let mut pending = HashSet::new();
        let depth = depth_of(collection, &name, &mut pending);
        if let Some(iface) = collection.get_mut(&name) {
            iface.rdepends_count = depth;
        }
    }
    Ok(())
}

fn depth_of(collection: &InterfaceCollection, name: &str, pending: &mut HashSet<String>) -> u32 {
    if pending.contains(name) {
        return 0;
    }
    let Some(iface) = collection.get(name) else {
        return 0;
    };
    let requires = iface.requires();
    if requires.is_empty() {
        return 0;
    }
    pending.insert(name.to_string());
    let mut depth = 0;
    for dep in &requires {
        depth = depth.max(depth_of(collection, dep, pending) + 1);
    }
    pending.remove(name);
    depth
}

/// Full resolution pass: query dependents, compute depths, and
/// stably reorder the collection by descending depth.
pub fn resolve(opts: &ExecuteOpts, collection: &mut InterfaceCollection) -> IfupResult<()> {
    count_rdepends(opts, collection)?;
    collection.sort_by_depth();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn mock_opts() -> ExecuteOpts {
        ExecuteOpts {
            mock: true,
            ..ExecuteOpts::default()
        }
    }

    fn chain_collection() -> InterfaceCollection {
        // a requires b, b requires c
        let mut collection = InterfaceCollection::new();
        collection.find_or_create("c");
        collection.find_or_create("b").vars.push("requires", "c");
        collection.find_or_create("a").vars.push("requires", "b");
        collection
    }

    #[test]
    fn test_depth_of_chain() {
        let opts = mock_opts();
        let mut collection = chain_collection();
        count_rdepends(&opts, &mut collection).unwrap();

        assert_eq!(collection.get("a").unwrap().rdepends_count, 2);
        assert_eq!(collection.get("b").unwrap().rdepends_count, 1);
        assert_eq!(collection.get("c").unwrap().rdepends_count, 0);
    }

    #[test]
    fn test_resolve_orders_deepest_first() {
        let opts = mock_opts();
        let mut collection = chain_collection();
        resolve(&opts, &mut collection).unwrap();
        assert_eq!(collection.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_terminates_with_finite_depths() {
        let opts = mock_opts();
        let mut collection = InterfaceCollection::new();
        collection.find_or_create("a").vars.push("requires", "b");
        collection.find_or_create("b").vars.push("requires", "a");

        resolve(&opts, &mut collection).unwrap();
        // both finite, both equal, original order preserved
        assert_eq!(collection.get("a").unwrap().rdepends_count, 2);
        assert_eq!(collection.get("b").unwrap().rdepends_count, 2);
        assert_eq!(collection.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_requirement_contributes_nothing() {
        let opts = mock_opts();
        let mut collection = InterfaceCollection::new();
        collection
            .find_or_create("a")
            .vars
            .push("requires", "ghost");
        count_rdepends(&opts, &mut collection).unwrap();
        assert_eq!(collection.get("a").unwrap().rdepends_count, 1);
        // depth computation never creates placeholder records
        assert!(!collection.contains("ghost"));
    }

    #[test]
    fn test_query_merges_static_entries() {
        let opts = mock_opts();
        let mut collection = InterfaceCollection::new();
        {
            let br0 = collection.find_or_create("br0");
            br0.vars.push("requires", "eth1 eth2");
            br0.vars.push("requires", "eth2 eth3");
        }
        query_dependents(&opts, &mut collection, "br0").unwrap();
        let br0 = collection.get("br0").unwrap();
        assert_eq!(br0.vars.get("requires"), Some("eth1 eth2 eth3"));
        assert_eq!(br0.vars.get_all("requires").count(), 1);
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
    fn test_query_merges_executor_reported_dependents() {
        let dir = tempfile::tempdir().unwrap();
        write_executor(dir.path(), "bridge", "echo eth2 eth3");
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };

        let mut collection = InterfaceCollection::new();
        {
            let br0 = collection.find_or_create("br0");
            br0.vars.push("use", "bridge");
            br0.vars.push("requires", "eth1 eth2");
        }
        query_dependents(&opts, &mut collection, "br0").unwrap();
        assert_eq!(
            collection.get("br0").unwrap().vars.get("requires"),
            Some("eth1 eth2 eth3")
        );
    }

    #[test]
    fn test_missing_executor_query_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ExecuteOpts {
            executor_path: dir.path().to_path_buf(),
            timeout: 5,
            ..ExecuteOpts::default()
        };
        let mut collection = InterfaceCollection::new();
        collection.find_or_create("eth0").vars.push("use", "dhcp");
        query_dependents(&opts, &mut collection, "eth0").unwrap();
        assert!(!collection.get("eth0").unwrap().vars.has("requires"));
    }
}
