pub mod artifact;
mod env;
mod files;

pub use artifact::{ArtifactName, ArtifactScope, Delimiter};
pub use env::EnvSource;
pub use files::FileSource;

use crate::config::{InstallerConfig, SourceKind};
use crate::error::{DiscoveryError, Error};
use crate::types::{Role, RoleCredential};

/// Resolves the credential tuple for a role. Read-only.
pub trait CredentialSource {
    fn resolve(&self, role: Role) -> Result<RoleCredential, DiscoveryError>;
}

/// Builds the source selected by `config.source`.
pub fn from_config(config: &InstallerConfig) -> Box<dyn CredentialSource> {
    match config.source {
        SourceKind::Files => Box::new(FileSource::new(config)),
        SourceKind::Env => Box::new(EnvSource::from_env()),
    }
}

/// Base credentials for all four roles.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub root: RoleCredential,
    pub migration: RoleCredential,
    pub write: RoleCredential,
    pub read: RoleCredential,
}

impl ResolvedCredentials {
    #[must_use]
    pub fn get(&self, role: Role) -> &RoleCredential {
        match role {
            Role::Root => &self.root,
            Role::Migration => &self.migration,
            Role::Write => &self.write,
            Role::Read => &self.read,
        }
    }
}

/// Resolves every role, collecting all failures instead of stopping at the first.
pub fn resolve_all(source: &dyn CredentialSource) -> Result<ResolvedCredentials, Vec<Error>> {
    let mut errors = Vec::new();
    let mut resolved = Vec::with_capacity(Role::ALL.len());

    for role in Role::ALL {
        match source.resolve(role) {
            Ok(credential) => resolved.push(credential),
            Err(e) => errors.push(Error::from(e)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut resolved = resolved.into_iter();
    match (resolved.next(), resolved.next(), resolved.next(), resolved.next()) {
        (Some(root), Some(migration), Some(write), Some(read)) => Ok(ResolvedCredentials {
            root,
            migration,
            write,
            read,
        }),
        _ => Err(vec![Error::Config(
            "credential source returned fewer roles than requested".to_string(),
        )]),
    }
}
