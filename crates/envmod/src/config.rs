// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file parsing and environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::{Shell, ShellState};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "ENVMOD_CONFIG";

/// API version for config files.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "envmod/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// Settings controlling discovery, delegation and output.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// API version identifier.
    #[serde(default)]
    pub api: ApiVersion,

    /// Search paths consulted after the entries of `MODULEPATH`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modulepath: Vec<PathBuf>,

    /// External module command used for delegated definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulecmd: Option<PathBuf>,

    /// Fail instead of warning when a search path is not a directory.
    #[serde(default)]
    pub strict_modulepath: bool,

    /// Drop path-list entries that do not exist before emitting.
    #[serde(default)]
    pub prune_missing_paths: bool,

    /// Default target shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl Config {
    /// Parse config from YAML string.
    pub fn from_yaml<S: AsRef<str>>(yaml: S, path: &Path) -> crate::Result<Self> {
        let invalid = |error| crate::Error::InvalidConfig {
            path: path.to_path_buf(),
            error,
        };

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value = serde_yaml::from_str(yaml.as_ref()).map_err(invalid)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(invalid)?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            ApiVersion::V0 => serde_yaml::from_value(value).map_err(invalid),
        }
    }

    /// Load config from file path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;
        Self::from_yaml(yaml, path)
    }

    /// Resolve the config for the invoking shell.
    ///
    /// Reads `$ENVMOD_CONFIG` or the per-user config file when present,
    /// then applies `ENVMOD_*` overrides from the shell state.
    pub fn discover(state: &ShellState) -> crate::Result<Self> {
        let explicit = state.get(CONFIG_PATH_VAR).map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(path)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(state);
        Ok(config)
    }

    /// Apply `ENVMOD_*` variables on top of file settings.
    pub fn apply_overrides(&mut self, state: &ShellState) {
        if let Some(cmd) = state.get("ENVMOD_MODULECMD").filter(|v| !v.is_empty()) {
            self.modulecmd = Some(PathBuf::from(cmd));
        }
        if let Some(strict) = state.get("ENVMOD_STRICT_MODULEPATH") {
            self.strict_modulepath = is_truthy(strict);
        }
        if let Some(prune) = state.get("ENVMOD_PRUNE_MISSING_PATHS") {
            self.prune_missing_paths = is_truthy(prune);
        }
        if let Some(shell) = state.get("ENVMOD_SHELL").filter(|v| !v.is_empty()) {
            self.shell = Some(shell.to_string());
        }
    }

    /// Target shell from config, falling back to `$SHELL`, then bash.
    pub fn target_shell(&self, state: &ShellState) -> crate::Result<Shell> {
        match &self.shell {
            Some(name) => name.parse(),
            None => Ok(state
                .get("SHELL")
                .and_then(Shell::from_path)
                .unwrap_or(Shell::Bash)),
        }
    }
}

/// Per-user config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("envmod").join("config.yaml"))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes" | "on")
}
