// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Loader
//!
//! Parses a directory of YAML policy files into an immutable
//! [`PolicySet`]. The loader is fail-safe per file: a file that does not
//! parse or validate is dropped with a [`LoadWarning`], and the remaining
//! files still produce a snapshot. Only a failure to read the directory
//! itself is an error.
//!
//! # File Format
//!
//! ```yaml
//! version: 1
//! agents:
//!   - id: finance-agent
//!     permissions:            # `allow` is accepted as an alias
//!       - tool: payments
//!         actions: [create, refund]
//!         conditions:
//!           max_amount: 5000
//!           currencies: [USD, EUR]
//!         require_approval: false
//! ```
//!
//! When several files define the same agent id, the file whose path sorts
//! last wins wholesale — an operator can shadow a rule by adding a file that
//! sorts after the original.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::policy::{AgentRule, Condition, Permission, PolicySet, PolicySource};

/// The only policy file format version this gateway understands.
pub const SUPPORTED_VERSION: i64 = 1;

// ============================================================================
// YAML Schema (External Representation)
// ============================================================================

#[derive(Debug, Deserialize)]
struct PolicyFileYaml {
    version: i64,
    agents: Vec<AgentRuleYaml>,
}

#[derive(Debug, Deserialize)]
struct AgentRuleYaml {
    id: String,
    #[serde(default)]
    allow_only_parents: Option<Vec<String>>,
    #[serde(default)]
    deny_if_parent: Vec<String>,
    #[serde(alias = "allow")]
    permissions: Vec<PermissionYaml>,
}

#[derive(Debug, Deserialize)]
struct PermissionYaml {
    tool: String,
    actions: Vec<String>,
    #[serde(default)]
    conditions: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    require_approval: bool,
}

// ============================================================================
// Loader
// ============================================================================

/// A non-fatal problem encountered during a load: a dropped file or an
/// ignored condition key.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Policy loader (infrastructure service).
pub struct PolicyLoader;

impl PolicyLoader {
    /// Load every `*.yaml` / `*.yml` file under `dir` into a snapshot.
    ///
    /// Files are processed in lexical path order; a later file's definition
    /// of an agent id replaces an earlier one wholesale. Invalid files are
    /// dropped and reported in the warning list. If every file drops, the
    /// result is the empty set plus the warnings.
    ///
    /// # Errors
    ///
    /// Only when the directory itself cannot be listed.
    pub fn load(dir: &Path) -> Result<(PolicySet, Vec<LoadWarning>), PolicyLoadError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| PolicyLoadError::Io {
                path: dir.display().to_string(),
                error: e.to_string(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_policy_file(p))
            .collect();
        paths.sort();

        let mut warnings = Vec::new();
        let mut agents: BTreeMap<String, AgentRule> = BTreeMap::new();
        let mut sources = Vec::new();

        for path in &paths {
            let display = path.display().to_string();
            match Self::load_file(path) {
                Ok(loaded) => {
                    for message in loaded.warnings {
                        warnings.push(LoadWarning {
                            path: display.clone(),
                            message,
                        });
                    }
                    sources.push(PolicySource {
                        path: display,
                        version: loaded.version,
                        agent_count: loaded.rules.len(),
                    });
                    for rule in loaded.rules {
                        agents.insert(rule.id.clone(), rule);
                    }
                }
                Err(e) => warnings.push(LoadWarning {
                    path: display,
                    message: e.to_string(),
                }),
            }
        }

        Ok((PolicySet::new(agents, sources), warnings))
    }

    fn load_file(path: &Path) -> Result<LoadedFile, PolicyFileError> {
        let content = fs::read_to_string(path).map_err(|e| PolicyFileError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate a single policy document.
    pub fn parse_yaml(yaml: &str) -> Result<LoadedFile, PolicyFileError> {
        let file: PolicyFileYaml =
            serde_yaml::from_str(yaml).map_err(|e| PolicyFileError::Yaml(e.to_string()))?;
        Self::validate_and_convert(file)
    }

    fn validate_and_convert(file: PolicyFileYaml) -> Result<LoadedFile, PolicyFileError> {
        if file.version != SUPPORTED_VERSION {
            return Err(PolicyFileError::UnsupportedVersion(file.version));
        }
        if file.agents.is_empty() {
            return Err(PolicyFileError::Validation(
                "at least one agent must be defined".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        let mut rules = Vec::with_capacity(file.agents.len());
        let mut seen = BTreeSet::new();

        for agent in file.agents {
            let id = agent.id.trim().to_string();
            if id.is_empty() {
                return Err(PolicyFileError::Validation(
                    "agent id is required".to_string(),
                ));
            }
            if !seen.insert(id.clone()) {
                return Err(PolicyFileError::Validation(format!(
                    "duplicate agent id: {}",
                    id
                )));
            }
            if agent.permissions.is_empty() {
                return Err(PolicyFileError::Validation(format!(
                    "agent {}: at least one permission required",
                    id
                )));
            }

            let mut permissions = Vec::with_capacity(agent.permissions.len());
            for perm in agent.permissions {
                permissions.push(Self::convert_permission(&id, perm, &mut warnings)?);
            }

            rules.push(AgentRule {
                id,
                allow_only_parents: agent
                    .allow_only_parents
                    .map(|parents| parents.into_iter().collect()),
                deny_if_parent: agent.deny_if_parent.into_iter().collect(),
                permissions,
            });
        }

        Ok(LoadedFile {
            version: SUPPORTED_VERSION as u32,
            rules,
            warnings,
        })
    }

    fn convert_permission(
        agent_id: &str,
        perm: PermissionYaml,
        warnings: &mut Vec<String>,
    ) -> Result<Permission, PolicyFileError> {
        let tool = perm.tool.trim().to_string();
        if tool.is_empty() {
            return Err(PolicyFileError::Validation(format!(
                "agent {}: tool is required",
                agent_id
            )));
        }
        if perm.actions.is_empty() {
            return Err(PolicyFileError::Validation(format!(
                "agent {}: at least one action required",
                agent_id
            )));
        }
        // Trimming plus the set makes duplicate actions harmless.
        let actions: BTreeSet<String> = perm
            .actions
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if actions.is_empty() {
            return Err(PolicyFileError::Validation(format!(
                "agent {}: at least one action required",
                agent_id
            )));
        }

        let mut conditions = Vec::new();
        for (key, value) in perm.conditions {
            match key.as_str() {
                "max_amount" => {
                    let limit = value.as_f64().ok_or_else(|| {
                        PolicyFileError::Validation(format!(
                            "agent {}: max_amount must be a number",
                            agent_id
                        ))
                    })?;
                    conditions.push(Condition::MaxAmount(limit));
                }
                "currencies" => {
                    let list = value.as_sequence().ok_or_else(|| {
                        PolicyFileError::Validation(format!(
                            "agent {}: currencies must be a list of strings",
                            agent_id
                        ))
                    })?;
                    let mut set = BTreeSet::new();
                    for item in list {
                        let currency = item.as_str().ok_or_else(|| {
                            PolicyFileError::Validation(format!(
                                "agent {}: currencies must be a list of strings",
                                agent_id
                            ))
                        })?;
                        set.insert(currency.to_string());
                    }
                    conditions.push(Condition::Currencies(set));
                }
                "folder_prefix" => {
                    let prefix = value.as_str().ok_or_else(|| {
                        PolicyFileError::Validation(format!(
                            "agent {}: folder_prefix must be a string",
                            agent_id
                        ))
                    })?;
                    conditions.push(Condition::FolderPrefix(prefix.to_string()));
                }
                unknown => {
                    warnings.push(format!(
                        "agent {}: ignoring unknown condition key '{}'",
                        agent_id, unknown
                    ));
                }
            }
        }
        // Canonical order keeps denial messages deterministic.
        conditions.sort_by_key(Condition::rank);

        Ok(Permission {
            tool,
            actions,
            conditions,
            require_approval: perm.require_approval,
        })
    }
}

/// One successfully parsed policy file, pre-merge.
#[derive(Debug)]
pub struct LoadedFile {
    pub version: u32,
    pub rules: Vec<AgentRule>,
    pub warnings: Vec<String>,
}

fn is_policy_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

// ============================================================================
// Errors
// ============================================================================

/// Failure to enumerate the policy directory. Per-file problems never reach
/// this type; they become [`LoadWarning`]s.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("IO error listing {path}: {error}")]
    Io { path: String, error: String },
}

/// Why a single policy file was dropped.
#[derive(Debug, thiserror::Error)]
pub enum PolicyFileError {
    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("unsupported policy version: {0}")]
    UnsupportedVersion(i64),

    #[error("validation error: {0}")]
    Validation(String),
}
