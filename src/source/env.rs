use std::collections::HashMap;

use super::CredentialSource;
use crate::error::DiscoveryError;
use crate::types::{Role, RoleCredential};

const PREFIX: &str = "HOLISTIC_DB";

/// Resolves credentials from `HOLISTIC_DB_*` variables.
///
/// Host, port and database are shared by every role; each role has its own
/// `HOLISTIC_DB_<ROLE>_USERNAME` and `HOLISTIC_DB_<ROLE>_PASSWORD`.
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot of the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn var(&self, name: String) -> Result<String, DiscoveryError> {
        match self.vars.get(&name) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ => Err(DiscoveryError::Env(name)),
        }
    }
}

impl CredentialSource for EnvSource {
    fn resolve(&self, role: Role) -> Result<RoleCredential, DiscoveryError> {
        let label = role.as_str().to_ascii_uppercase();
        Ok(RoleCredential {
            host: self.var(format!("{PREFIX}_HOSTNAME"))?,
            port: self.var(format!("{PREFIX}_PORT_NUMBER"))?,
            database: self.var(format!("{PREFIX}_NAME"))?,
            username: self.var(format!("{PREFIX}_{label}_USERNAME"))?,
            password: self.var(format!("{PREFIX}_{label}_PASSWORD"))?,
            pool_index: None,
        })
    }
}
