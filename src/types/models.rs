use std::fmt;

use serde::{Deserialize, Serialize};

use super::Privilege;

/// A category of database principal with a fixed privilege template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    Migration,
    Write,
    Read,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Root, Role::Migration, Role::Write, Role::Read];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Migration => "migration",
            Role::Write => "write",
            Role::Read => "read",
        }
    }

    /// Privileges granted on `<database>.*`, one grant call each, in order.
    #[must_use]
    pub const fn grants(self) -> &'static [Privilege] {
        match self {
            Role::Root => &[],
            Role::Migration => &[Privilege::All],
            Role::Write => &[Privilege::Insert, Privilege::Update, Privilege::Select],
            Role::Read => &[Privilege::Select],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical database principal to be ensured.
#[derive(Clone, PartialEq, Eq)]
pub struct RoleCredential {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Present only for pool members; singleton roles carry `None`, never `Some(0)`.
    pub pool_index: Option<u32>,
}

impl RoleCredential {
    /// The principal name as created on the server, base name plus pool index.
    #[must_use]
    pub fn principal(&self) -> String {
        match self.pool_index {
            Some(index) => format!("{}{index}", self.username),
            None => self.username.clone(),
        }
    }

    /// Derives pool member `index` from a base credential.
    #[must_use]
    pub fn pool_member(&self, index: u32) -> Self {
        Self {
            pool_index: Some(index),
            ..self.clone()
        }
    }

    /// Same identity, artifact scoped to a different database name.
    #[must_use]
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for RoleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool_index", &self.pool_index)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    pub name: String,
    pub character_set: String,
    pub collation: String,
}

/// The bookkeeping table read by the schema migration process.
#[derive(Debug, Clone, Copy)]
pub struct SchemaTrackingRecord;

impl SchemaTrackingRecord {
    pub const TABLE: &'static str = "DatabaseMigration";
    pub const DEFAULT_CURRENT: i64 = -1;
    pub const DEFAULT_DESIRED: i64 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> RoleCredential {
        RoleCredential {
            host: "db1".to_string(),
            port: "3306".to_string(),
            database: "holistic".to_string(),
            username: "holistic_w".to_string(),
            password: "secret".to_string(),
            pool_index: None,
        }
    }

    #[test]
    fn test_principal_appends_pool_index() {
        assert_eq!(credential().principal(), "holistic_w");
        assert_eq!(credential().pool_member(0).principal(), "holistic_w0");
        assert_eq!(credential().pool_member(99).principal(), "holistic_w99");
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", credential());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_role_grant_templates() {
        assert_eq!(Role::Migration.grants(), &[Privilege::All]);
        assert_eq!(
            Role::Write.grants(),
            &[Privilege::Insert, Privilege::Update, Privilege::Select]
        );
        assert_eq!(Role::Read.grants(), &[Privilege::Select]);
        assert!(Role::Root.grants().is_empty());
    }
}
