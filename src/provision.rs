//! The provisioning state machine.
//!
//! Steps run strictly in plan order and each one checks for existing state
//! before mutating. The first failure ends the run. Nothing already applied
//! is undone: a re-run relies on the per-step existence checks to make
//! forward progress.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::error::Error;
use crate::gateway::{Gateway, TableSchema};
use crate::persist::CredentialWriter;
use crate::plan::{ProvisioningPlan, RoleIdentity, Step};
use crate::types::{Privilege, Role, SchemaTrackingRecord};

const ALL_TABLES: &str = "*";

/// Last state the run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    DatabaseEnsured,
    LoggingConfigured,
    RoleEnsured {
        role: Role,
        pool_index: Option<u32>,
    },
    SchemaTableEnsured,
    SeedRowEnsured,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Start => f.write_str("start"),
            Stage::DatabaseEnsured => f.write_str("database ensured"),
            Stage::LoggingConfigured => f.write_str("server configured"),
            Stage::RoleEnsured {
                role,
                pool_index: Some(index),
            } => write!(f, "{role} user {index} ensured"),
            Stage::RoleEnsured {
                role,
                pool_index: None,
            } => write!(f, "{role} user ensured"),
            Stage::SchemaTableEnsured => f.write_str("schema table ensured"),
            Stage::SeedRowEnsured => f.write_str("seed row ensured"),
            Stage::Done => f.write_str("done"),
        }
    }
}

/// Which branch an ensure-step took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOutcome {
    /// A row was inserted with this primary key.
    Inserted(u64),
    /// The table already held this many rows.
    AlreadyPresent(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOutcome {
    pub role: Role,
    pub principal: String,
    pub user: Outcome,
    pub grants: Vec<Privilege>,
    pub artifacts: Vec<PathBuf>,
}

/// What one run did, step by step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub started_at: DateTime<Utc>,
    /// Unset when the run stopped early.
    pub finished_at: Option<DateTime<Utc>>,
    pub stage: Stage,
    pub database: Option<Outcome>,
    pub roles: Vec<RoleOutcome>,
    pub schema_table: Option<Outcome>,
    pub seed_row: Option<SeedOutcome>,
}

impl ProvisionReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stage: Stage::Start,
            database: None,
            roles: Vec::new(),
            schema_table: None,
            seed_row: None,
        }
    }

    #[must_use]
    pub fn users_created(&self) -> usize {
        self.roles
            .iter()
            .filter(|r| r.user == Outcome::Created)
            .count()
    }

    #[must_use]
    pub fn artifacts_written(&self) -> usize {
        self.roles.iter().map(|r| r.artifacts.len()).sum()
    }
}

/// A run that stopped early, with everything applied before the failure.
#[derive(Debug, Error)]
#[error("provisioning stopped after {}: {source}", .report.stage)]
pub struct ProvisionFailure {
    pub report: ProvisionReport,
    #[source]
    pub source: Error,
}

pub struct Provisioner<'a, G: Gateway + ?Sized> {
    gateway: &'a G,
    writer: &'a CredentialWriter<'a>,
}

impl<'a, G: Gateway + ?Sized> Provisioner<'a, G> {
    pub fn new(gateway: &'a G, writer: &'a CredentialWriter<'a>) -> Self {
        Self { gateway, writer }
    }

    /// Executes every step of `plan` in order.
    pub fn run(&self, plan: &ProvisioningPlan) -> Result<ProvisionReport, ProvisionFailure> {
        let mut report = ProvisionReport::new();

        for step in plan.steps() {
            if let Err(source) = self.execute(plan, step, &mut report) {
                return Err(ProvisionFailure { report, source });
            }
        }

        report.stage = Stage::Done;
        report.finished_at = Some(Utc::now());
        info!(
            "provisioning complete: {} user(s) created, {} credential file(s) written",
            report.users_created(),
            report.artifacts_written()
        );
        Ok(report)
    }

    fn execute(
        &self,
        plan: &ProvisioningPlan,
        step: Step<'_>,
        report: &mut ProvisionReport,
    ) -> Result<(), Error> {
        match step {
            Step::EnsureDatabase => {
                report.database = Some(self.ensure_database(plan)?);
                report.stage = Stage::DatabaseEnsured;
            }
            Step::ConfigureServer => {
                self.configure_server(plan)?;
                report.stage = Stage::LoggingConfigured;
            }
            Step::EnsureRole(identity) => {
                report.roles.push(self.ensure_role(plan, identity)?);
                report.stage = Stage::RoleEnsured {
                    role: identity.role,
                    pool_index: identity.credential.pool_index,
                };
            }
            Step::EnsureSchemaTable => {
                report.schema_table = Some(self.ensure_schema_table()?);
                report.stage = Stage::SchemaTableEnsured;
            }
            Step::EnsureSeedRow => {
                report.seed_row = Some(self.ensure_seed_row()?);
                report.stage = Stage::SeedRowEnsured;
            }
        }
        Ok(())
    }

    fn ensure_database(&self, plan: &ProvisioningPlan) -> Result<Outcome, Error> {
        let target = plan.target();
        if self.gateway.database_exists(&target.name)? {
            info!("(skip) database {} already exists", target.name);
            return Ok(Outcome::Skipped);
        }
        info!(
            "creating database {} ({} / {})",
            target.name, target.character_set, target.collation
        );
        self.gateway.create_database(target)?;
        Ok(Outcome::Created)
    }

    /// Idempotent on the server side, so applied on every run.
    fn configure_server(&self, plan: &ProvisioningPlan) -> Result<(), Error> {
        self.gateway.use_database(&plan.target().name)?;
        info!("disabling general query log");
        self.gateway.disable_general_log()?;
        info!("setting time zone to UTC");
        self.gateway.set_timezone_utc()?;
        info!("setting strict SQL mode");
        self.gateway.set_sql_mode_strict()?;
        Ok(())
    }

    fn ensure_role(
        &self,
        plan: &ProvisioningPlan,
        identity: &RoleIdentity,
    ) -> Result<RoleOutcome, Error> {
        let credential = &identity.credential;
        let principal = credential.principal();

        // An existing user's password is never rotated here.
        let user = if self.gateway.user_exists(&principal)? {
            info!("(skip) {} user {principal} already exists", identity.role);
            Outcome::Skipped
        } else {
            info!("creating {} user {principal}", identity.role);
            let created =
                self.gateway
                    .create_user(&principal, &credential.password, plan.account_host())?;
            // Some servers do not apply the password at creation time.
            info!("updating password for {principal}");
            self.gateway.update_password(&created, &credential.password)?;
            Outcome::Created
        };

        let live = self.gateway.get_user(&principal)?;
        let grants = identity.role.grants();
        for privilege in grants {
            info!(
                "granting {privilege} on {}.{ALL_TABLES} to {principal}",
                plan.target().name
            );
            self.gateway
                .grant(&live, *privilege, &plan.target().name, ALL_TABLES)?;
        }

        let artifacts = self.writer.persist_all(identity.role, credential)?;

        Ok(RoleOutcome {
            role: identity.role,
            principal,
            user,
            grants: grants.to_vec(),
            artifacts,
        })
    }

    fn ensure_schema_table(&self) -> Result<Outcome, Error> {
        if self.gateway.table_exists(SchemaTrackingRecord::TABLE)? {
            info!("(skip) table {} already exists", SchemaTrackingRecord::TABLE);
            return Ok(Outcome::Skipped);
        }
        info!("creating table {}", SchemaTrackingRecord::TABLE);
        self.gateway.create_table(&TableSchema::database_migration())?;
        Ok(Outcome::Created)
    }

    fn ensure_seed_row(&self) -> Result<SeedOutcome, Error> {
        let table = self.gateway.get_table(SchemaTrackingRecord::TABLE)?;
        let rows = self.gateway.count_rows(&table)?;
        if rows > 0 {
            info!("(skip) {} record already exists", table.name);
            return Ok(SeedOutcome::AlreadyPresent(rows));
        }
        info!("creating {} record", table.name);
        let id = self.gateway.insert_row(&table)?;
        info!(
            "created {} record with {}: {id}",
            table.name, table.primary_key
        );
        Ok(SeedOutcome::Inserted(id))
    }
}
