use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::source::{ArtifactScope, Delimiter};
use crate::types::{DatabaseTarget, Role};

pub const DEFAULT_POOL_SIZE: u32 = 100;

/// Where role credentials are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Files,
    Env,
}

/// Label each role carries in artifact filenames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleLabels {
    pub root: String,
    pub migration: String,
    pub write: String,
    pub read: String,
}

impl RoleLabels {
    #[must_use]
    pub fn get(&self, role: Role) -> &str {
        match role {
            Role::Root => &self.root,
            Role::Migration => &self.migration,
            Role::Write => &self.write,
            Role::Read => &self.read,
        }
    }
}

impl Default for RoleLabels {
    fn default() -> Self {
        Self {
            root: "root".to_string(),
            migration: "holistic_mig".to_string(),
            write: "holistic_w".to_string(),
            read: "holistic_r".to_string(),
        }
    }
}

/// Host accounts that receive a copy of each role's artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountFanOut {
    pub migration: Vec<String>,
    pub write: Vec<String>,
    pub read: Vec<String>,
}

impl AccountFanOut {
    #[must_use]
    pub fn for_role(&self, role: Role) -> &[String] {
        match role {
            Role::Root => &[],
            Role::Migration => &self.migration,
            Role::Write => &self.write,
            Role::Read => &self.read,
        }
    }
}

/// Settings for one provisioning run. Built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub data_dir: PathBuf,
    pub database: String,
    pub character_set: String,
    pub collation: String,
    pub pool_size: u32,
    pub prefix: String,
    pub delimiter: Delimiter,
    pub source: SourceKind,
    pub labels: RoleLabels,
    /// Host pattern for created users. Falls back to the credential's host.
    pub user_host: Option<String>,
    pub scopes: Vec<ArtifactScope>,
    pub credentials_subdir: String,
    pub accounts: AccountFanOut,
    /// Include expanded pool usernames in the uniqueness check.
    pub check_pool_uniqueness: bool,
}

impl InstallerConfig {
    /// Reads a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Rejects settings no run could succeed with.
    pub fn check(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::Config("database cannot be empty".to_string()));
        }
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix cannot be empty".to_string()));
        }
        if self.prefix.contains(self.delimiter.as_char()) {
            return Err(Error::Config(format!(
                "prefix {} cannot contain the delimiter {}",
                self.prefix,
                self.delimiter.as_char()
            )));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("at least one artifact scope is required".to_string()));
        }
        if self.credentials_subdir.is_empty() || self.credentials_subdir.contains('/') {
            return Err(Error::Config(format!(
                "credentials_subdir {:?} must be a single path component",
                self.credentials_subdir
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn target(&self) -> DatabaseTarget {
        DatabaseTarget {
            name: self.database.clone(),
            character_set: self.character_set.clone(),
            collation: self.collation.clone(),
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database: "holistic".to_string(),
            character_set: "utf8mb4".to_string(),
            collation: "utf8mb4_0900_ai_ci".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            prefix: "holistic_db_config".to_string(),
            delimiter: Delimiter::Hash,
            source: SourceKind::Files,
            labels: RoleLabels::default(),
            user_host: None,
            scopes: vec![ArtifactScope::Database],
            credentials_subdir: ".holistic_db".to_string(),
            accounts: AccountFanOut::default(),
            check_pool_uniqueness: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = InstallerConfig::from_toml("").unwrap();
        assert_eq!(config, InstallerConfig::default());
        assert_eq!(config.pool_size, 100);
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = InstallerConfig::from_toml(
            r#"
            database = "ledger"
            pool_size = 4
            delimiter = "colon"
            scopes = ["server", "database", "catalog"]

            [labels]
            write = "ledger_w"

            [accounts]
            write = ["app1", "app2"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database, "ledger");
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.delimiter, Delimiter::Colon);
        assert_eq!(config.scopes.len(), 3);
        assert_eq!(config.labels.write, "ledger_w");
        assert_eq!(config.labels.read, "holistic_r");
        assert_eq!(config.accounts.for_role(Role::Write), ["app1", "app2"]);
        assert!(config.accounts.for_role(Role::Read).is_empty());
    }

    #[test]
    fn test_rejects_prefix_containing_delimiter() {
        assert!(InstallerConfig::from_toml(r##"prefix = "a#b""##).is_err());
        assert!(InstallerConfig::from_toml(r#"prefix = "a#b"
delimiter = "colon""#)
            .is_ok());
    }

    #[test]
    fn test_rejects_unknown_source() {
        assert!(InstallerConfig::from_toml(r#"source = "vault""#).is_err());
    }
}
