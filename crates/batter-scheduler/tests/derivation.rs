//! End-to-end derivation from a manifest and worker roster.

use batter_config::{WorkerRoster, parse_manifest};
use batter_core::Combination;
use batter_core::engine::{Category, ChangeEvent, SchedulerSpec};
use batter_core::step::Step;
use batter_scheduler::BuildManager;
use chrono::NaiveTime;
use std::collections::HashSet;

const MANIFEST: &str = r#"
versions "2.6" "2.7"
combination "core" "trunk"
combination "core" "dev"

target "core" sandbox=#true {
    branch "trunk" url="http://svn.example.org/core/trunk"
    branch "dev" url="http://svn.example.org/core/dev"
    rules {
        test "nosetests"
        build "python-dist" eggs=#true
        upload "dist" path="/var/www/eggs"
    }
    triggers "plugin"
}

target "plugin" {
    branch "trunk" url="http://svn.example.org/plugin/trunk"
    rules {
        test "nosetests"
    }
}
"#;

const WORKERS: &str = "linux-py26\t2.6\tsecret\nlinux-py27\t2.7\tsecret\n";

fn manager(manifest: &str) -> BuildManager {
    let manifest = parse_manifest(manifest).unwrap();
    let roster = WorkerRoster::parse(WORKERS).unwrap();
    BuildManager::from_manifest(manifest, &roster).unwrap()
}

fn builder_names(manager: &BuildManager) -> Vec<String> {
    manager.builders().into_iter().map(|b| b.name).collect()
}

#[test]
fn test_builder_names_across_matrix() {
    let manager = manager(MANIFEST);

    assert_eq!(
        builder_names(&manager),
        vec![
            "plugin_core_trunk_py2.6",
            "plugin_core_trunk_py2.7",
            "plugin_core_dev_py2.6",
            "plugin_core_dev_py2.7",
            "core_py2.6",
            "core_py2.7",
            "core_dev_py2.6",
            "core_dev_py2.7",
            "core_sandbox_py2.6",
            "core_sandbox_py2.7",
            "core_dev_sandbox_py2.6",
            "core_dev_sandbox_py2.7",
        ]
    );
}

#[test]
fn test_builder_names_are_unique() {
    let names = builder_names(&manager(MANIFEST));
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_every_scheduled_builder_exists() {
    let manager = manager(MANIFEST);
    let builders: HashSet<_> = builder_names(&manager).into_iter().collect();

    for scheduler in manager.schedulers() {
        for name in scheduler.builder_names() {
            assert!(
                builders.contains(name),
                "scheduler {} names missing builder {}",
                scheduler.name(),
                name
            );
        }
    }
}

#[test]
fn test_scheduler_phase_order() {
    let manager = manager(MANIFEST);
    let schedulers = manager.schedulers();

    let kinds: Vec<&str> = schedulers
        .iter()
        .map(|s| match s {
            SchedulerSpec::Nightly { .. } => "nightly",
            SchedulerSpec::Triggerable { .. } | SchedulerSpec::RepoChange { .. } => "continuous",
            SchedulerSpec::TryJobdir { .. } => "sandbox",
        })
        .collect();

    let mut sorted = kinds.clone();
    sorted.sort_by_key(|k| match *k {
        "nightly" => 0,
        "continuous" => 1,
        _ => 2,
    });
    assert_eq!(kinds, sorted);
    assert_eq!(schedulers.last().map(|s| s.name()), Some("sandbox_core"));
}

#[test]
fn test_changes_route_by_repository() {
    let manager = manager(MANIFEST);
    let change = ChangeEvent {
        repo_id: Some("core_dev".to_string()),
        revision: "42".to_string(),
        author: "dev".to_string(),
    };

    let fired: Vec<_> = manager
        .schedulers()
        .into_iter()
        .filter(|s| s.accepts_change(&change))
        .collect();

    assert_eq!(fired.len(), 1);
    assert_eq!(
        fired[0].builder_names(),
        &["core_dev_py2.6".to_string(), "core_dev_py2.7".to_string()]
    );
}

#[test]
fn test_trigger_targets_downstream_cell() {
    let manager = manager(MANIFEST);
    let builders = manager.builders();
    let core_dev = builders.iter().find(|b| b.name == "core_dev_py2.7").unwrap();

    let triggers: Vec<_> = core_dev
        .steps
        .iter()
        .filter_map(|s| match s {
            Step::Trigger(t) => Some(t.scheduler_names.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        triggers,
        vec![vec!["triggered_plugin_core_dev_py2.7".to_string()]]
    );

    let schedulers = manager.schedulers();
    assert!(
        schedulers
            .iter()
            .any(|s| s.name() == "triggered_plugin_core_dev_py2.7")
    );
}

#[test]
fn test_exclusion_is_local_to_target() {
    let excluded = MANIFEST.replace(
        "    triggers \"plugin\"\n",
        "    triggers \"plugin\"\n    exclude \"core\" \"dev\"\n",
    );
    let manager = manager(&excluded);
    let names = builder_names(&manager);

    assert!(!names.iter().any(|n| n.starts_with("core_dev_")));
    assert!(names.contains(&"plugin_core_dev_py2.6".to_string()));

    for scheduler in manager.schedulers() {
        assert!(scheduler.builder_names().iter().all(|n| !n.starts_with("core_dev_")));
        assert_ne!(scheduler.name(), "triggered_core_core_dev_py2.6");
    }
}

#[test]
fn test_nightly_stagger_end_to_end() {
    let nightly = MANIFEST.replace(
        "target \"plugin\" {\n",
        "target \"plugin\" {\n    nightly hour=0 minute=0 stagger=5400\n",
    );
    let manager = manager(&nightly);

    let nightly: Vec<_> = manager
        .schedulers()
        .into_iter()
        .filter_map(|s| match s {
            SchedulerSpec::Nightly {
                name,
                at,
                builder_names,
            } => Some((name, at, builder_names)),
            _ => None,
        })
        .collect();

    assert_eq!(nightly.len(), 2);
    assert_eq!(nightly[0].0, "nightly_plugin_core_trunk");
    assert_eq!(nightly[0].1, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    assert_eq!(nightly[1].1, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    assert_eq!(
        nightly[1].2,
        vec!["plugin_core_dev_py2.6".to_string(), "plugin_core_dev_py2.7".to_string()]
    );

    // A nightly target is never triggered, so core has nothing to trigger.
    assert!(
        manager
            .builders()
            .iter()
            .flat_map(|b| &b.steps)
            .all(|s| !matches!(s, Step::Trigger(_)))
    );
    assert!(
        manager
            .schedulers()
            .iter()
            .all(|s| !s.name().starts_with("triggered_plugin"))
    );
}

#[test]
fn test_sandbox_builders_follow_regular_builders() {
    let manager = manager(MANIFEST);
    let categories: Vec<_> = manager.builders().into_iter().map(|b| b.category).collect();

    let first_sandbox = categories
        .iter()
        .position(|c| *c == Category::Sandbox)
        .unwrap();
    assert!(categories[first_sandbox..].iter().all(|c| *c == Category::Sandbox));
}

#[test]
fn test_owner_cells_follow_branch() {
    let manager = manager(MANIFEST);
    let core = manager.target("core").unwrap();

    assert!(
        core.builder_name(
            &Combination::new("core", "trunk"),
            "2.6",
            core.branch("dev"),
            false
        )
        .is_none()
    );
    assert_eq!(
        core.builder_name(
            &Combination::new("core", "dev"),
            "2.6",
            core.branch("dev"),
            false
        )
        .as_deref(),
        Some("core_dev_py2.6")
    );
}

const PLUGIN_TRIGGERS_CORE: &str = r#"
versions "2.6" "2.7"
combination "core" "trunk"
combination "core" "dev"

target "core" {
    branch "trunk" url="http://svn.example.org/core/trunk"
    branch "dev" url="http://svn.example.org/core/dev"
    rules
}

target "plugin" {
    branch "trunk" url="http://svn.example.org/plugin/trunk"
    rules
    triggers "core"
}
"#;

#[test]
fn test_plugin_triggering_core() {
    let manager = manager(PLUGIN_TRIGGERS_CORE);
    let builders = manager.builders();
    let names: Vec<_> = builders.iter().map(|b| b.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "plugin_core_trunk_py2.6",
            "plugin_core_trunk_py2.7",
            "plugin_core_dev_py2.6",
            "plugin_core_dev_py2.7",
            "core_py2.6",
            "core_py2.7",
            "core_dev_py2.6",
            "core_dev_py2.7",
        ]
    );

    let plugin_dev = builders
        .iter()
        .find(|b| b.name == "plugin_core_dev_py2.6")
        .unwrap();
    let triggers: Vec<_> = plugin_dev
        .steps
        .iter()
        .filter_map(|s| match s {
            Step::Trigger(t) => Some(t.scheduler_names.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        triggers,
        vec![vec!["triggered_core_core_dev_py2.6".to_string()]]
    );

    let triggered = manager
        .schedulers()
        .into_iter()
        .find(|s| s.name() == "triggered_core_core_dev_py2.6")
        .unwrap();
    assert_eq!(triggered.builder_names(), &["core_dev_py2.6".to_string()]);
}
