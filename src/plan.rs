use tracing::warn;

use crate::config::InstallerConfig;
use crate::error::{Error, ValidationError};
use crate::source::ResolvedCredentials;
use crate::types::{DatabaseTarget, Role, RoleCredential};
use crate::validation::{self, MAX_USERNAME_LEN};

/// One principal the provisioner ensures.
#[derive(Debug, Clone)]
pub struct RoleIdentity {
    pub role: Role,
    pub credential: RoleCredential,
}

/// An ensure-step, in execution order.
#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    EnsureDatabase,
    ConfigureServer,
    EnsureRole(&'a RoleIdentity),
    EnsureSchemaTable,
    EnsureSeedRow,
}

/// The validated desired state for one run.
///
/// A plan can only be built from credentials that passed field and
/// uniqueness validation, so holding one means no check is left to do
/// before the first mutating call.
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    target: DatabaseTarget,
    root: RoleCredential,
    account_host: String,
    pool_size: u32,
    identities: Vec<RoleIdentity>,
}

impl ProvisioningPlan {
    /// Validates `creds` and expands the pools. Every problem is returned,
    /// not just the first.
    pub fn build(creds: ResolvedCredentials, config: &InstallerConfig) -> Result<Self, Vec<Error>> {
        let mut errors: Vec<ValidationError> = Vec::new();

        let database = &creds.root.database;
        if let Err(reason) = validation::validate_database_name(database) {
            errors.push(invalid("database name", reason));
        }
        if *database != config.database {
            warn!(
                "credentials name database {database}, configured database {} is not used",
                config.database
            );
        }
        if config.pool_size == 0 {
            errors.push(invalid("pool size", "must be at least 1".to_string()));
        }
        for role in Role::ALL {
            errors.extend(validation::check_credential(role.as_str(), creds.get(role)));
        }
        errors.extend(check_same_server(&creds));
        if let Some(host) = &config.user_host {
            if let Err(reason) = validation::validate_account_host(host) {
                errors.push(invalid("user host", reason));
            }
        }

        let suffix_len = config.pool_size.saturating_sub(1).to_string().len();
        for role in [Role::Write, Role::Read] {
            let base = &creds.get(role).username;
            if base.len() + suffix_len > MAX_USERNAME_LEN {
                errors.push(invalid(
                    &format!("{role} username"),
                    format!(
                        "{base} leaves no room for a {suffix_len} digit pool index within {MAX_USERNAME_LEN} characters"
                    ),
                ));
            }
        }

        let base_unique = validation::validate_unique(
            Role::ALL.iter().map(|r| creds.get(*r).username.as_str()),
            Role::ALL.iter().map(|r| creds.get(*r).password.as_str()),
        );
        let base_ok = base_unique.is_ok();
        if let Err(duplicates) = base_unique {
            errors.extend(duplicates);
        }

        let plan = Self::expand(creds, config);

        if base_ok && config.check_pool_uniqueness {
            let principals: Vec<String> = std::iter::once(plan.root.principal())
                .chain(plan.identities.iter().map(|i| i.credential.principal()))
                .collect();
            if let Err(duplicates) =
                validation::validate_unique(principals.iter().map(String::as_str), std::iter::empty::<&str>())
            {
                errors.extend(duplicates);
            }
        }

        if errors.is_empty() {
            Ok(plan)
        } else {
            Err(errors.into_iter().map(Error::from).collect())
        }
    }

    /// Points every identity at the database the root credential names.
    fn expand(creds: ResolvedCredentials, config: &InstallerConfig) -> Self {
        let target = DatabaseTarget {
            name: creds.root.database.clone(),
            ..config.target()
        };
        let root = creds.root.clone();

        let pin = |role: Role| RoleCredential {
            database: target.name.clone(),
            ..creds.get(role).clone()
        };

        let mut identities = vec![RoleIdentity {
            role: Role::Migration,
            credential: pin(Role::Migration),
        }];
        for role in [Role::Write, Role::Read] {
            let base = pin(role);
            identities.extend((0..config.pool_size).map(|index| RoleIdentity {
                role,
                credential: base.pool_member(index),
            }));
        }

        Self {
            account_host: config.user_host.clone().unwrap_or_else(|| root.host.clone()),
            pool_size: config.pool_size,
            target,
            root,
            identities,
        }
    }

    #[must_use]
    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Credential the administration connection is opened with.
    #[must_use]
    pub fn root(&self) -> &RoleCredential {
        &self.root
    }

    /// Host part given to `create_user`.
    #[must_use]
    pub fn account_host(&self) -> &str {
        &self.account_host
    }

    #[must_use]
    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    #[must_use]
    pub fn identities(&self) -> &[RoleIdentity] {
        &self.identities
    }

    pub fn steps(&self) -> impl Iterator<Item = Step<'_>> {
        [Step::EnsureDatabase, Step::ConfigureServer]
            .into_iter()
            .chain(self.identities.iter().map(Step::EnsureRole))
            .chain([Step::EnsureSchemaTable, Step::EnsureSeedRow])
    }
}

/// Every role must live on the root connection's server.
fn check_same_server(creds: &ResolvedCredentials) -> Vec<ValidationError> {
    let root = &creds.root;
    let mut errors = Vec::new();
    for role in [Role::Migration, Role::Write, Role::Read] {
        let cred = creds.get(role);
        if cred.host != root.host {
            errors.push(invalid(
                &format!("{role} hostname"),
                format!("{} differs from root hostname {}", cred.host, root.host),
            ));
        }
        if cred.port != root.port {
            errors.push(invalid(
                &format!("{role} port"),
                format!("{} differs from root port {}", cred.port, root.port),
            ));
        }
    }
    errors
}

fn invalid(field: &str, reason: String) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason,
    }
}
