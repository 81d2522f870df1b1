//! Credential artifact format.
//!
//! Filename grammar, with `D` the configured delimiter:
//!
//! ```text
//! <prefix>D<host>D<port>D<database>D<label>[.config]
//! ```
//!
//! Exactly five fields. No field may contain `D`; `database` may be empty
//! for server-scoped artifacts. The body is line oriented:
//!
//! ```text
//! [client]
//! user=<username>
//! password=<password>
//! [mysqld]
//! skip-log-bin
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;
use crate::types::RoleCredential;

pub const EXTENSION: &str = ".config";
const CATALOG_DATABASE: &str = "mysql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Hash,
    Colon,
}

impl Delimiter {
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Delimiter::Hash => '#',
            Delimiter::Colon => ':',
        }
    }
}

/// Which database name an artifact is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactScope {
    /// No database selected.
    Server,
    /// The provisioned database.
    Database,
    /// The server's system catalog.
    Catalog,
}

impl ArtifactScope {
    #[must_use]
    pub fn database_name(self, target: &str) -> &str {
        match self {
            ArtifactScope::Server => "",
            ArtifactScope::Database => target,
            ArtifactScope::Catalog => CATALOG_DATABASE,
        }
    }
}

/// The five structured fields encoded in an artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub prefix: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub label: String,
}

impl ArtifactName {
    /// Name of the artifact written for `credential`; the label is the
    /// principal, so pool members carry their index.
    #[must_use]
    pub fn for_credential(prefix: &str, credential: &RoleCredential) -> Self {
        Self {
            prefix: prefix.to_string(),
            host: credential.host.clone(),
            port: credential.port.clone(),
            database: credential.database.clone(),
            label: credential.principal(),
        }
    }

    #[must_use]
    pub fn render(&self, delimiter: Delimiter) -> String {
        let d = delimiter.as_char();
        format!(
            "{}{d}{}{d}{}{d}{}{d}{}{EXTENSION}",
            self.prefix, self.host, self.port, self.database, self.label
        )
    }

    pub fn parse(filename: &str, delimiter: Delimiter) -> Result<Self, DiscoveryError> {
        let stem = filename.strip_suffix(EXTENSION).unwrap_or(filename);
        let parts: Vec<&str> = stem.split(delimiter.as_char()).collect();
        let [prefix, host, port, database, label] = parts.as_slice() else {
            return Err(DiscoveryError::MalformedConfig {
                filename: filename.to_string(),
                fields: parts.len(),
            });
        };
        Ok(Self {
            prefix: prefix.to_string(),
            host: host.to_string(),
            port: port.to_string(),
            database: database.to_string(),
            label: label.to_string(),
        })
    }
}

/// Whether `filename` could be the artifact for `label` in `database`.
/// The extension is optional.
#[must_use]
pub fn is_candidate(
    filename: &str,
    prefix: &str,
    database: &str,
    label: &str,
    delimiter: Delimiter,
) -> bool {
    let d = delimiter.as_char();
    let stem = filename.strip_suffix(EXTENSION).unwrap_or(filename);
    stem.starts_with(&format!("{prefix}{d}")) && stem.ends_with(&format!("{d}{database}{d}{label}"))
}

#[must_use]
pub fn render_body(principal: &str, password: &str) -> String {
    format!("[client]\nuser={principal}\npassword={password}\n[mysqld]\nskip-log-bin")
}

/// Extracts `user=` and `password=`. First occurrence of each key wins.
#[must_use]
pub fn parse_body(content: &str) -> (Option<&str>, Option<&str>) {
    let mut user = None;
    let mut password = None;
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if user.is_none() {
            user = line.strip_prefix("user=");
        }
        if password.is_none() {
            password = line.strip_prefix("password=");
        }
    }
    (
        user.filter(|u| !u.is_empty()),
        password.filter(|p| !p.is_empty()),
    )
}

/// Reads one artifact back into a credential. Pool members come back with
/// their index folded into `username`.
pub fn read_artifact(path: &Path, delimiter: Delimiter) -> Result<RoleCredential, DiscoveryError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = ArtifactName::parse(&filename, delimiter)?;

    let content = fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (user, password) = parse_body(&content);
    let username = user.ok_or_else(|| DiscoveryError::MissingField {
        filename: filename.clone(),
        field: "user",
    })?;
    let password = password.ok_or_else(|| DiscoveryError::MissingField {
        filename: filename.clone(),
        field: "password",
    })?;

    Ok(RoleCredential {
        host: name.host,
        port: name.port,
        database: name.database,
        username: username.to_string(),
        password: password.to_string(),
        pool_index: None,
    })
}
