// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that Tugdiff uses to
//! simplify the process of serialization and deserialization. The
//! configuration is handed explicitly to whatever builds the fetchers of a
//! comparison. The comparison engine itself needs no configuration.
//!
//! # General Layout
//!
//! ```toml
//! [settings]
//! page_size = 20
//! context_radius = 3
//! total_count = "page-local"
//!
//! [[environment]]
//! name = "DEV"
//! snapshot = "$HOME/snapshots/dev.toml"
//!
//! [[environment]]
//! name = "QA"
//! snapshot = "$HOME/snapshots/qa.toml"
//! ```

use crate::{
    compare::{paging::DEFAULT_PAGE_SIZE, TotalCount},
    diff::text::DEFAULT_CONTEXT_RADIUS,
};

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Tugdiff configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TugdiffConfig {
    /// General comparison settings.
    #[serde(default)]
    pub settings: Settings,

    /// Environments that can be compared.
    #[serde(default, rename = "environment")]
    pub environments: Vec<Environment>,
}

impl TugdiffConfig {
    /// Find environment by name.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnknownEnvironment`] if no environment has
    ///   that name.
    pub fn environment(&self, name: impl AsRef<str>) -> Result<&Environment> {
        let name = name.as_ref();
        self.environments
            .iter()
            .find(|environment| environment.name == name)
            .ok_or_else(|| ConfigError::UnknownEnvironment { name: name.into() })
    }
}

impl FromStr for TugdiffConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: TugdiffConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on snapshot paths.
        for environment in &mut config.environments {
            environment.snapshot = Snapshot::new(
                shellexpand::full(environment.snapshot.to_string().as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            );
        }

        // INVARIANT: Environment names are unique.
        let mut seen = BTreeSet::new();
        for environment in &config.environments {
            if !seen.insert(environment.name.as_str()) {
                return Err(ConfigError::DuplicateEnvironment {
                    name: environment.name.clone(),
                });
            }
        }

        if config.settings.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }

        Ok(config)
    }
}

impl Display for TugdiffConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// General comparison settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Number of keys per page.
    pub page_size: usize,

    /// Unchanged lines shown around each diff hunk.
    pub context_radius: usize,

    /// What the total count reports after each page.
    pub total_count: TotalCount,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            context_radius: DEFAULT_CONTEXT_RADIUS,
            total_count: TotalCount::default(),
        }
    }
}

/// Named environment whose records can be compared.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Environment {
    /// Name of the environment, e.g., "DEV" or "QA".
    pub name: String,

    /// Snapshot file holding the environment's records.
    pub snapshot: Snapshot,
}

/// Path to a snapshot file of string keys mapped to string values.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Snapshot(PathBuf);

impl Snapshot {
    /// Construct new snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat snapshot as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    /// Read snapshot records.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadSnapshot`] if snapshot cannot be read.
    /// - Return [`ConfigError::Deserialize`] if snapshot is not a flat table
    ///   of strings.
    pub async fn load(&self) -> Result<BTreeMap<String, String>> {
        let content = tokio::fs::read_to_string(self.as_path())
            .await
            .map_err(|err| ConfigError::ReadSnapshot {
                source: err,
                path: self.0.clone(),
            })?;

        Ok(toml::de::from_str(&content)?)
    }
}

impl Display for Snapshot {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration file cannot be read from.
    #[error("failed to read configuration at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot file cannot be read from.
    #[error("failed to read snapshot at {:?}", path.display())]
    ReadSnapshot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Environment is not configured.
    #[error("no environment named {name:?}")]
    UnknownEnvironment { name: String },

    /// Environment is configured twice.
    #[error("environment {name:?} is defined more than once")]
    DuplicateEnvironment { name: String },

    /// Page size of zero.
    #[error("page size must be at least one")]
    ZeroPageSize,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Read configuration file.
///
/// # Errors
///
/// - Return [`ConfigError::ReadConfig`] if file cannot be read.
/// - Return any parse error of [`TugdiffConfig::from_str`].
pub fn read_config(path: impl AsRef<Path>) -> Result<TugdiffConfig> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map_err(|err| ConfigError::ReadConfig {
            source: err,
            path: path.to_path_buf(),
        })?
        .parse()
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
