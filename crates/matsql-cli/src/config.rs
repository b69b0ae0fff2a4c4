//! `matsql.yaml` parsing with environment variable substitution.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use matsql_fence::{CheckpointTable, FenceStore, PostgresFenceStore, SqliteFenceStore};
use matsql_types::MaterializationSpec;
use matsql_validate::{InfoSchemaSnapshot, TypeMap};
use regex::Regex;
use serde::Deserialize;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatsqlConfig {
    #[serde(default)]
    pub checkpoints: Option<CheckpointConfig>,
    /// Column typing for the config-driven constrainer.
    #[serde(default)]
    pub type_map: TypeMap,
    #[serde(default)]
    pub validate: Option<ValidateConfig>,
}

/// Where the checkpoint table lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CheckpointConfig {
    Sqlite {
        path: PathBuf,
        #[serde(default)]
        table: Option<String>,
    },
    Postgres {
        url: String,
        #[serde(default)]
        table: Option<String>,
    },
}

impl CheckpointConfig {
    /// The configured table, or the default table.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a plain identifier.
    pub fn table(&self) -> Result<CheckpointTable> {
        let name = match self {
            Self::Sqlite { table, .. } | Self::Postgres { table, .. } => table.as_deref(),
        };
        match name {
            Some(name) => CheckpointTable::new(name).context("Invalid checkpoint table name"),
            None => Ok(CheckpointTable::default()),
        }
    }

    /// Open the configured checkpoint table, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or initialized.
    pub fn open(&self) -> Result<Box<dyn FenceStore>> {
        let table = self.table()?;
        let store: Box<dyn FenceStore> = match self {
            Self::Sqlite { path, .. } => {
                tracing::debug!(path = %path.display(), table = %table, "Opening SQLite checkpoint table");
                Box::new(SqliteFenceStore::open(path, &table).with_context(|| {
                    format!("Failed to open SQLite checkpoints at {}", path.display())
                })?)
            }
            Self::Postgres { url, .. } => {
                tracing::debug!(table = %table, "Opening PostgreSQL checkpoint table");
                Box::new(
                    PostgresFenceStore::open(url, &table)
                        .context("Failed to open PostgreSQL checkpoints")?,
                )
            }
        };
        Ok(store)
    }
}

/// Inputs of `matsql validate`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateConfig {
    /// Snapshot of the destination's tables and columns.
    #[serde(default)]
    pub info_schema: InfoSchemaSnapshot,
    pub proposed: MaterializationSpec,
    /// The currently applied materialization, if any.
    #[serde(default)]
    pub existing: Option<MaterializationSpec>,
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| {
            missing.push(cap[1].to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<MatsqlConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: MatsqlConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse matsql config YAML")?;
    Ok(config)
}

/// Parse a config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<MatsqlConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}
