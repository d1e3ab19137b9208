//! Target manifest parsing.
//!
//! ```kdl
//! versions "2.6" "2.7"
//! combination "core" "trunk"
//!
//! target "core" sandbox=#true {
//!     branch "trunk" vcs="svn" url="http://svn.example.org/core/trunk"
//!     branch "dev" vcs="git" url="git://example.org/core.git" upstream="dev"
//!     rules {
//!         environment "virtualenv" {
//!             egg-deps "nose"
//!             find-links "http://eggs.example.org"
//!         }
//!         test "nosetests" "-v"
//!         build "python-dist" eggs=#true
//!         upload "dist" path="/var/www/eggs"
//!     }
//!     triggers "plugin"
//!     nightly hour=2 minute=0 stagger=1800
//! }
//! ```

use batter_core::branch::DEFAULT_SVN_POLL_SECS;
use batter_core::rules::{
    BuildRule, BuildRulesConfig, CheckoutRule, EnvironmentRule, TestRule, UploadRule,
};
use batter_core::{BranchSpec, Combination, NightlySchedule, TargetSpec, Vcs};
use kdl::{KdlDocument, KdlNode};
use std::path::Path;

use crate::{ConfigError, ConfigResult};

/// Everything declared in a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Interpreter versions, in declared order.
    pub versions: Vec<String>,
    /// The primary build axis, in declared order.
    pub combinations: Vec<Combination>,
    /// Targets in registration order.
    pub targets: Vec<TargetSpec>,
}

/// Read and parse a manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> ConfigResult<Manifest> {
    let text = std::fs::read_to_string(path)?;
    parse_manifest(&text)
}

/// Parse a manifest from KDL text.
pub fn parse_manifest(kdl: &str) -> ConfigResult<Manifest> {
    let doc: KdlDocument = kdl.parse()?;

    let mut versions: Vec<String> = Vec::new();
    let mut combinations: Vec<Combination> = Vec::new();
    let mut targets = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "versions" => {
                for version in get_all_string_args(node) {
                    if versions.contains(&version) {
                        return Err(ConfigError::Duplicate(format!("version '{}'", version)));
                    }
                    versions.push(version);
                }
            }
            "combination" => {
                let combination = parse_combination(node, "combination")?;
                if combinations.contains(&combination) {
                    return Err(ConfigError::Duplicate(format!(
                        "combination '{}'",
                        combination
                    )));
                }
                combinations.push(combination);
            }
            "target" => {
                targets.push(parse_target(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if versions.is_empty() {
        return Err(ConfigError::MissingField("versions".to_string()));
    }

    Ok(Manifest {
        versions,
        combinations,
        targets,
    })
}

fn parse_combination(node: &KdlNode, field: &str) -> ConfigResult<Combination> {
    match get_all_string_args(node).as_slice() {
        [primary, variant] => Ok(Combination::new(primary.clone(), variant.clone())),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "expected a target name and a variant".to_string(),
        }),
    }
}

fn parse_target(node: &KdlNode) -> ConfigResult<TargetSpec> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("target name".to_string()))?;

    let mut target = TargetSpec::new(name);
    target.allow_sandbox = get_bool_prop(node, "sandbox").unwrap_or(false);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "branch" => {
                    let branch = parse_branch(child, &target.name)?;
                    if target.branches.iter().any(|b| b.name == branch.name) {
                        return Err(ConfigError::Duplicate(format!(
                            "branch '{}' of target '{}'",
                            branch.name, target.name
                        )));
                    }
                    target.branches.push(branch);
                }
                "rules" => {
                    target.rules = Some(parse_rules(child, &target.name)?);
                }
                "dependencies" => {
                    target.dependencies.extend(get_all_string_args(child));
                }
                "triggers" => {
                    target.triggers.extend(get_all_string_args(child));
                }
                "wait-for-triggers" => {
                    target.wait_for_triggers = get_first_bool_arg(child).unwrap_or(true);
                }
                "trigger-property" => match get_all_string_args(child).as_slice() {
                    [key, value] => {
                        target.trigger_properties.insert(key.clone(), value.clone());
                    }
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            field: format!("trigger-property of target '{}'", target.name),
                            message: "expected a name and a value".to_string(),
                        });
                    }
                },
                "exclude" => {
                    let field = format!("exclude of target '{}'", target.name);
                    target.excluded.insert(parse_combination(child, &field)?);
                }
                "nightly" => {
                    target.nightly = Some(parse_nightly(child, &target.name)?);
                }
                _ => {}
            }
        }
    }

    Ok(target)
}

fn parse_branch(node: &KdlNode, target: &str) -> ConfigResult<BranchSpec> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField(format!("branch name in target '{}'", target)))?;

    let field = |prop: &str| format!("{} of branch '{}' in target '{}'", prop, name, target);

    let url = get_string_prop(node, "url");
    if let Some(url) = &url {
        url::Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            field: field("url"),
            message: e.to_string(),
        })?;
    }

    let upstream = get_string_prop(node, "upstream");
    let vcs_name = get_string_prop(node, "vcs").unwrap_or_else(|| "svn".to_string());
    let vcs = match vcs_name.as_str() {
        "svn" => {
            if upstream.is_some() {
                return Err(ConfigError::InvalidValue {
                    field: field("upstream"),
                    message: "only git branches track an upstream".to_string(),
                });
            }
            Vcs::Svn
        }
        "git" => Vcs::Git {
            upstream: upstream.unwrap_or_else(|| name.clone()),
        },
        other => {
            return Err(ConfigError::InvalidValue {
                field: field("vcs"),
                message: format!("unknown version control system: {}", other),
            });
        }
    };

    let poll_interval_secs = match get_integer_prop(node, "poll") {
        Some(secs) => u64::try_from(secs).map_err(|_| ConfigError::InvalidValue {
            field: field("poll"),
            message: format!("expected a non-negative number of seconds, got {}", secs),
        })?,
        None if vcs == Vcs::Svn => DEFAULT_SVN_POLL_SECS,
        None => 0,
    };

    Ok(BranchSpec {
        name,
        vcs,
        url,
        poll_interval_secs,
    })
}

fn parse_rules(node: &KdlNode, target: &str) -> ConfigResult<BuildRulesConfig> {
    let mut rules = BuildRulesConfig::default();

    let Some(children) = node.children() else {
        return Ok(rules);
    };

    for child in children.nodes() {
        let phase = child.name().value();
        let variant = get_first_string_arg(child).unwrap_or_default();
        let unknown = || ConfigError::InvalidValue {
            field: format!("{} rule of target '{}'", phase, target),
            message: format!("unknown variant: {}", variant),
        };

        match phase {
            "checkout" => {
                rules.checkout = match variant.as_str() {
                    "branch" | "" => CheckoutRule::Branch,
                    "skip" => CheckoutRule::Skip,
                    _ => return Err(unknown()),
                };
            }
            "environment" => {
                rules.environment = match variant.as_str() {
                    "none" => EnvironmentRule::None,
                    "virtualenv" => EnvironmentRule::Virtualenv {
                        egg_deps: get_string_list_prop(child, "egg-deps"),
                        find_links: get_string_list_prop(child, "find-links"),
                        upload_url: get_string_prop(child, "upload-url")
                            .or_else(|| child_string_arg(child, "upload-url")),
                    },
                    _ => return Err(unknown()),
                };
            }
            "test" => {
                let command = get_all_string_args(child);
                rules.test = if command.is_empty() {
                    TestRule::None
                } else {
                    TestRule::Command {
                        command,
                        flunk_on_warnings: get_bool_prop(child, "flunk-on-warnings")
                            .unwrap_or(true),
                    }
                };
            }
            "build" => {
                rules.build = match variant.as_str() {
                    "none" => BuildRule::None,
                    "python-dist" => BuildRule::PythonDist {
                        build_eggs: get_bool_prop(child, "eggs").unwrap_or(true),
                    },
                    _ => return Err(unknown()),
                };
            }
            "upload" => {
                rules.upload = match variant.as_str() {
                    "none" => UploadRule::None,
                    "dist" => UploadRule::Dist {
                        default_path: get_string_prop(child, "path").ok_or_else(|| {
                            ConfigError::MissingField(format!(
                                "upload path of target '{}'",
                                target
                            ))
                        })?,
                    },
                    _ => return Err(unknown()),
                };
            }
            _ => {}
        }
    }

    Ok(rules)
}

fn parse_nightly(node: &KdlNode, target: &str) -> ConfigResult<NightlySchedule> {
    let field = |prop: &str| format!("nightly {} of target '{}'", prop, target);

    let hour = get_integer_prop(node, "hour").unwrap_or(0);
    let minute = get_integer_prop(node, "minute").unwrap_or(0);
    let stagger = get_integer_prop(node, "stagger").unwrap_or(0);

    if !(0..24).contains(&hour) {
        return Err(ConfigError::InvalidValue {
            field: field("hour"),
            message: format!("{} is not an hour of the day", hour),
        });
    }
    if !(0..60).contains(&minute) {
        return Err(ConfigError::InvalidValue {
            field: field("minute"),
            message: format!("{} is not a minute of the hour", minute),
        });
    }
    let stagger_secs = u64::try_from(stagger).map_err(|_| ConfigError::InvalidValue {
        field: field("stagger"),
        message: format!("expected a non-negative number of seconds, got {}", stagger),
    })?;

    Ok(NightlySchedule {
        hour: hour as u32,
        minute: minute as u32,
        stagger_secs,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_bool_arg(node: &KdlNode) -> Option<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

fn get_integer_prop(node: &KdlNode, name: &str) -> Option<i128> {
    node.get(name).and_then(|v| v.as_integer())
}

fn child_string_arg(node: &KdlNode, name: &str) -> Option<String> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
        .and_then(get_first_string_arg)
}

fn get_string_list_prop(node: &KdlNode, name: &str) -> Vec<String> {
    // Repeated properties: egg-deps="a" egg-deps="b"
    let result: Vec<String> = node
        .entries()
        .iter()
        .filter(|e| e.name().is_some_and(|n| n.value() == name))
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect();

    if !result.is_empty() {
        return result;
    }

    // Block syntax: egg-deps "a" "b"
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == name {
                return get_all_string_args(child);
            }
        }
    }

    Vec::new()
}
