//! Deterministic names for builders, triggerable schedulers and repositories.
//!
//! Nothing links a scheduler to its builders except these names, so every
//! pass (pollers, schedulers, builders, trigger steps) recomputes them from
//! the same inputs instead of sharing a cache.

use crate::branch::Branch;
use crate::combination::Combination;
use crate::target::BuildTarget;

/// Builder name of the cell `(target, combination, version, branch, sandbox)`.
///
/// Returns `None` when `target` owns `combination` and `branch` is not the
/// branch the combination selects. A target that does not own the
/// combination builds under it for every branch it declares, with the
/// combination embedded in the name.
///
/// Explicit exclusions are not checked here; see [`BuildTarget::builder_name`].
pub fn builder_name(
    target: &BuildTarget,
    combination: &Combination,
    version: &str,
    branch: Option<&Branch>,
    sandbox: bool,
) -> Option<String> {
    let mut suffix = if combination.is_owned_by(&target.name) {
        if branch.is_some_and(|b| b.name != combination.variant) {
            return None;
        }
        String::new()
    } else {
        format!("{}_{}_", combination.primary, combination.variant)
    };

    if sandbox {
        suffix.push_str("sandbox_");
    }

    let mut base = target.name.clone();
    if let Some(branch) = branch.filter(|b| !b.is_head() && target.branches.len() > 1) {
        base.push('_');
        base.push_str(&branch.name);
    }

    Some(format!("{}_{}py{}", base, suffix, version))
}

/// Name of the triggerable scheduler that starts `target_name`'s builds
/// for one combination and version.
pub fn trigger_name(target_name: &str, combination: &Combination, version: &str) -> String {
    format!(
        "triggered_{}_{}_{}_py{}",
        target_name, combination.primary, combination.variant, version
    )
}

/// Repository identity used to route changes to schedulers.
pub fn repo_id(target_name: &str, branch_name: &str) -> String {
    format!("{}_{}", target_name, branch_name)
}

/// Property holding the absolute working directory of `target_name`'s build.
pub fn workdir_property(target_name: &str) -> String {
    format!("{}_workdir", target_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchSpec;
    use crate::target::{TargetIndex, TargetSpec};

    fn target(name: &str, branches: Vec<BranchSpec>) -> BuildTarget {
        let mut spec = TargetSpec::new(name);
        spec.branches = branches;
        BuildTarget::link(TargetIndex::new(0), spec)
    }

    fn core() -> BuildTarget {
        target(
            "core",
            vec![
                BranchSpec::svn("trunk", "http://svn.example.org/core/trunk"),
                BranchSpec::svn("dev", "http://svn.example.org/core/dev"),
            ],
        )
    }

    #[test]
    fn test_owner_head_branch() {
        let core = core();
        let combo = Combination::new("core", "trunk");
        assert_eq!(
            builder_name(&core, &combo, "2.6", Some(&core.branches[0]), false).as_deref(),
            Some("core_py2.6")
        );
    }

    #[test]
    fn test_owner_non_head_branch_gets_disambiguator() {
        let core = core();
        let combo = Combination::new("core", "dev");
        assert_eq!(
            builder_name(&core, &combo, "2.7", Some(&core.branches[1]), false).as_deref(),
            Some("core_dev_py2.7")
        );
    }

    #[test]
    fn test_owner_mismatched_branch_is_excluded() {
        let core = core();
        let combo = Combination::new("core", "trunk");
        for version in ["2.6", "2.7"] {
            for sandbox in [false, true] {
                assert!(
                    builder_name(&core, &combo, version, Some(&core.branches[1]), sandbox)
                        .is_none()
                );
            }
        }
    }

    #[test]
    fn test_foreign_combination_suffix() {
        let plugin = target(
            "plugin",
            vec![BranchSpec::svn("trunk", "http://svn.example.org/plugin/trunk")],
        );
        let combo = Combination::new("core", "dev");
        assert_eq!(
            builder_name(&plugin, &combo, "2.6", Some(&plugin.branches[0]), false).as_deref(),
            Some("plugin_core_dev_py2.6")
        );
        assert_eq!(
            builder_name(&plugin, &combo, "2.6", Some(&plugin.branches[0]), true).as_deref(),
            Some("plugin_core_dev_sandbox_py2.6")
        );
    }

    #[test]
    fn test_single_branch_never_gets_disambiguator() {
        let plugin = target(
            "plugin",
            vec![BranchSpec::svn("feature", "http://svn.example.org/plugin/feature")],
        );
        assert!(!plugin.branches[0].is_head());
        let name = builder_name(
            &plugin,
            &Combination::new("core", "trunk"),
            "2.6",
            Some(&plugin.branches[0]),
            false,
        )
        .unwrap();
        assert!(!name.contains("feature"));
    }

    #[test]
    fn test_without_branch() {
        let core = core();
        assert_eq!(
            builder_name(&core, &Combination::new("core", "dev"), "2.5", None, true).as_deref(),
            Some("core_sandbox_py2.5")
        );
    }

    #[test]
    fn test_builder_name_is_deterministic() {
        let core = core();
        let combo = Combination::new("core", "dev");
        let first = builder_name(&core, &combo, "2.6", Some(&core.branches[1]), true);
        let second = builder_name(&core, &combo, "2.6", Some(&core.branches[1]), true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_trigger_name() {
        assert_eq!(
            trigger_name("plugin", &Combination::new("core", "trunk"), "2.6"),
            "triggered_plugin_core_trunk_py2.6"
        );
    }
}
