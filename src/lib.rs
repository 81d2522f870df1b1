//! # dbstrap
//!
//! Brings a MySQL server into a known-good state and can be re-run safely:
//! the target database, a migration user, pools of write and read users with
//! their grants, and the `DatabaseMigration` tracking table with its single
//! seed row. Credentials for every provisioned user are written out as
//! client option files.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use dbstrap::config::InstallerConfig;
//! use dbstrap::gateway::MysqlGateway;
//! use dbstrap::persist::{CredentialWriter, SystemAccounts};
//! use dbstrap::plan::ProvisioningPlan;
//! use dbstrap::provision::Provisioner;
//! use dbstrap::source;
//!
//! let config = InstallerConfig::default();
//! let creds = source::resolve_all(source::from_config(&config).as_ref())?;
//! let plan = ProvisioningPlan::build(creds, &config)?;
//! let gateway = MysqlGateway::connect(plan.root())?;
//! let writer = CredentialWriter::new(&config, &SystemAccounts);
//! let report = Provisioner::new(&gateway, &writer).run(&plan)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `dbstrap` binary. Disable with `default-features = false`.

pub mod config;
pub mod error;
pub mod gateway;
pub mod persist;
pub mod plan;
pub mod provision;
pub mod source;
pub mod types;
pub mod validation;
