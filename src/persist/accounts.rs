use std::path::PathBuf;

use nix::unistd::{Gid, Group, Uid, User};

use crate::error::PersistenceError;

/// A host account that can receive credential artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAccount {
    pub name: String,
    pub home: PathBuf,
    pub uid: Uid,
    /// `None` when the passwd entry names a group that does not exist.
    pub primary_group: Option<Gid>,
}

pub trait HostAccounts {
    fn lookup(&self, name: &str) -> Result<HostAccount, PersistenceError>;
}

/// Looks accounts up in the system user and group databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

impl HostAccounts for SystemAccounts {
    fn lookup(&self, name: &str) -> Result<HostAccount, PersistenceError> {
        let lookup_err = |source| PersistenceError::AccountLookup {
            account: name.to_string(),
            source,
        };

        let user = User::from_name(name)
            .map_err(lookup_err)?
            .ok_or_else(|| PersistenceError::UnknownAccount(name.to_string()))?;
        let group = Group::from_gid(user.gid).map_err(lookup_err)?;

        Ok(HostAccount {
            name: user.name,
            home: user.dir,
            uid: user.uid,
            primary_group: group.map(|g| g.gid),
        })
    }
}
