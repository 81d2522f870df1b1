use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::CredentialSource;
use super::artifact::{self, ArtifactName, Delimiter};
use crate::config::{InstallerConfig, RoleLabels};
use crate::error::DiscoveryError;
use crate::types::{Role, RoleCredential};

/// Resolves credentials from artifacts in one directory.
///
/// Exactly one file may match a role. Several matches are reported as
/// ambiguous instead of picking whichever the directory listing yields last.
pub struct FileSource {
    dir: PathBuf,
    prefix: String,
    database: String,
    delimiter: Delimiter,
    labels: RoleLabels,
}

impl FileSource {
    pub fn new(config: &InstallerConfig) -> Self {
        Self {
            dir: config.data_dir.clone(),
            prefix: config.prefix.clone(),
            database: config.database.clone(),
            delimiter: config.delimiter,
            labels: config.labels.clone(),
        }
    }

    fn example(&self, label: &str) -> String {
        ArtifactName {
            prefix: self.prefix.clone(),
            host: "127.0.0.1".to_string(),
            port: "3306".to_string(),
            database: self.database.clone(),
            label: label.to_string(),
        }
        .render(self.delimiter)
    }

    fn candidates(&self, label: &str) -> Result<Vec<String>, DiscoveryError> {
        let io_err = |source| DiscoveryError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if artifact::is_candidate(&name, &self.prefix, &self.database, label, self.delimiter) {
                found.push(name);
            }
        }
        // an extensionless input and the artifact written back for it are one credential
        let with_ext: Vec<String> = found
            .iter()
            .filter(|name| name.ends_with(artifact::EXTENSION))
            .cloned()
            .collect();
        found.retain(|name| !with_ext.contains(&format!("{name}{}", artifact::EXTENSION)));
        found.sort();
        Ok(found)
    }
}

impl CredentialSource for FileSource {
    fn resolve(&self, role: Role) -> Result<RoleCredential, DiscoveryError> {
        let label = self.labels.get(role);
        let mut candidates = self.candidates(label)?;

        let filename = match candidates.len() {
            0 => {
                return Err(DiscoveryError::NotFound {
                    role,
                    dir: self.dir.clone(),
                    example: self.example(label),
                });
            }
            1 => candidates.remove(0),
            _ => return Err(DiscoveryError::Ambiguous { role, candidates }),
        };

        debug!("resolved {role} credentials from {filename}");
        artifact::read_artifact(&self.dir.join(filename), self.delimiter)
    }
}
