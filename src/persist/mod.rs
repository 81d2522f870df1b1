//! Credential artifact persistence.
//!
//! Every identity is written to the data directory. Accounts listed for the
//! identity's role additionally get a copy under
//! `<home>/<credentials_subdir>/`, owned by the account and its primary group.
//! Artifacts are replaced on every run, never appended or versioned.

mod accounts;

pub use accounts::{HostAccount, HostAccounts, SystemAccounts};

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid, chown};
use tracing::{debug, info};

use crate::config::{AccountFanOut, InstallerConfig};
use crate::error::PersistenceError;
use crate::source::artifact::{self, ArtifactName, ArtifactScope, Delimiter};
use crate::types::{Role, RoleCredential};

const ARTIFACT_MODE: u32 = 0o600;
const CREDENTIALS_DIR_MODE: u32 = 0o700;

pub struct CredentialWriter<'a> {
    data_dir: PathBuf,
    prefix: String,
    delimiter: Delimiter,
    scopes: Vec<ArtifactScope>,
    credentials_subdir: String,
    fan_out: AccountFanOut,
    accounts: &'a dyn HostAccounts,
}

impl<'a> CredentialWriter<'a> {
    pub fn new(config: &InstallerConfig, accounts: &'a dyn HostAccounts) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            prefix: config.prefix.clone(),
            delimiter: config.delimiter,
            scopes: config.scopes.clone(),
            credentials_subdir: config.credentials_subdir.clone(),
            fan_out: config.accounts.clone(),
            accounts,
        }
    }

    /// Deterministic artifact filename for `credential`.
    #[must_use]
    pub fn artifact_name(&self, credential: &RoleCredential) -> String {
        ArtifactName::for_credential(&self.prefix, credential).render(self.delimiter)
    }

    /// Writes one artifact, to the data directory or to `account`'s
    /// credentials directory.
    pub fn persist(
        &self,
        credential: &RoleCredential,
        account: Option<&str>,
    ) -> Result<PathBuf, PersistenceError> {
        let filename = self.artifact_name(credential);

        let Some(name) = account else {
            fs::create_dir_all(&self.data_dir).map_err(PersistenceError::io(&self.data_dir))?;
            let path = self.data_dir.join(filename);
            write_artifact(&path, credential)?;
            debug!("wrote {}", path.display());
            return Ok(path);
        };

        let account = self.accounts.lookup(name)?;
        let gid = account
            .primary_group
            .ok_or_else(|| PersistenceError::MissingPrimaryGroup(name.to_string()))?;

        let dir = account.home.join(&self.credentials_subdir);
        ensure_credentials_dir(&dir)?;
        let path = dir.join(filename);
        write_artifact(&path, credential)?;

        set_owner(&path, account.uid, gid)?;
        set_owner(&dir, account.uid, gid)?;
        debug!("wrote {} for account {name}", path.display());
        Ok(path)
    }

    /// Writes every configured scope of `credential`, once for the data
    /// directory and once per account listed for `role`.
    pub fn persist_all(
        &self,
        role: Role,
        credential: &RoleCredential,
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        let accounts = self.fan_out.for_role(role);
        let mut written = Vec::with_capacity(self.scopes.len() * (accounts.len() + 1));

        for scope in &self.scopes {
            let scoped = credential.with_database(scope.database_name(&credential.database));
            written.push(self.persist(&scoped, None)?);
            for account in accounts {
                written.push(self.persist(&scoped, Some(account))?);
            }
        }

        info!(
            "wrote {} credential file(s) for {}",
            written.len(),
            credential.principal()
        );
        Ok(written)
    }
}

fn ensure_credentials_dir(dir: &Path) -> Result<(), PersistenceError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir(dir).map_err(PersistenceError::io(dir))?;
    fs::set_permissions(dir, fs::Permissions::from_mode(CREDENTIALS_DIR_MODE))
        .map_err(PersistenceError::io(dir))
}

/// Removes any previous artifact at `path` and writes a fresh one.
fn write_artifact(path: &Path, credential: &RoleCredential) -> Result<(), PersistenceError> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(PersistenceError::io(path)(e)),
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(ARTIFACT_MODE)
        .open(path)
        .map_err(PersistenceError::io(path))?;
    file.write_all(artifact::render_body(&credential.principal(), &credential.password).as_bytes())
        .map_err(PersistenceError::io(path))
}

fn set_owner(path: &Path, uid: Uid, gid: Gid) -> Result<(), PersistenceError> {
    chown(path, Some(uid), Some(gid)).map_err(|source| PersistenceError::Ownership {
        path: path.to_path_buf(),
        source,
    })
}
