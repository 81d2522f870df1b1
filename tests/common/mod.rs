#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use dbstrap::config::InstallerConfig;
use dbstrap::error::AdministrationError;
use dbstrap::gateway::{DbUser, Gateway, GatewayResult, TableHandle, TableSchema};
use dbstrap::plan::ProvisioningPlan;
use dbstrap::source::ResolvedCredentials;
use dbstrap::types::{DatabaseTarget, Privilege, RoleCredential};

/// Every call the provisioner made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DatabaseExists(String),
    CreateDatabase(DatabaseTarget),
    UseDatabase(String),
    DisableGeneralLog,
    SetTimezoneUtc,
    SetSqlModeStrict,
    UserExists(String),
    CreateUser { name: String, host: String },
    UpdatePassword(String),
    GetUser(String),
    Grant {
        user: String,
        privilege: Privilege,
        database: String,
        table: String,
    },
    TableExists(String),
    CreateTable(String),
    GetTable(String),
    CountRows(String),
    InsertRow(String),
}

impl Call {
    /// Calls that change server state other than grants.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Call::CreateDatabase(_)
                | Call::CreateUser { .. }
                | Call::UpdatePassword(_)
                | Call::CreateTable(_)
                | Call::InsertRow(_)
        )
    }
}

/// Observable server state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub databases: BTreeMap<String, DatabaseTarget>,
    /// name -> (host, password)
    pub users: BTreeMap<String, (String, String)>,
    pub grants: BTreeSet<(String, Privilege, String)>,
    /// (database, table) -> row count
    pub tables: BTreeMap<(String, String), u64>,
    pub general_log: bool,
    pub utc: bool,
    pub strict: bool,
}

type FailPoint = Box<dyn Fn(&Call) -> bool>;

/// In-memory gateway that records calls and can fail on demand.
#[derive(Default)]
pub struct RecordingGateway {
    state: RefCell<ServerState>,
    selected: RefCell<Option<String>>,
    next_id: RefCell<u64>,
    calls: RefCell<Vec<Call>>,
    fail_on: RefCell<Option<FailPoint>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.state.borrow_mut().general_log = true;
        gateway
    }

    pub fn with_database(self, name: &str) -> Self {
        self.state.borrow_mut().databases.insert(
            name.to_string(),
            DatabaseTarget {
                name: name.to_string(),
                character_set: "latin1".to_string(),
                collation: "latin1_swedish_ci".to_string(),
            },
        );
        self
    }

    pub fn with_user(self, name: &str, password: &str) -> Self {
        self.state
            .borrow_mut()
            .users
            .insert(name.to_string(), ("%".to_string(), password.to_string()));
        self
    }

    pub fn with_table(self, database: &str, table: &str, rows: u64) -> Self {
        self.state
            .borrow_mut()
            .tables
            .insert((database.to_string(), table.to_string()), rows);
        *self.next_id.borrow_mut() = rows;
        self
    }

    pub fn fail_when(&self, predicate: impl Fn(&Call) -> bool + 'static) {
        *self.fail_on.borrow_mut() = Some(Box::new(predicate));
    }

    pub fn clear_failure(&self) {
        *self.fail_on.borrow_mut() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) -> GatewayResult<()> {
        let fail = self
            .fail_on
            .borrow()
            .as_ref()
            .is_some_and(|predicate| predicate(&call));
        self.calls.borrow_mut().push(call);
        if fail {
            return Err(AdministrationError::Rejected("injected failure".to_string()));
        }
        Ok(())
    }

    fn selected(&self) -> GatewayResult<String> {
        self.selected
            .borrow()
            .clone()
            .ok_or(AdministrationError::NoDatabaseSelected)
    }
}

impl Gateway for RecordingGateway {
    fn database_exists(&self, name: &str) -> GatewayResult<bool> {
        self.record(Call::DatabaseExists(name.to_string()))?;
        Ok(self.state.borrow().databases.contains_key(name))
    }

    fn create_database(&self, target: &DatabaseTarget) -> GatewayResult<()> {
        self.record(Call::CreateDatabase(target.clone()))?;
        let mut state = self.state.borrow_mut();
        if state.databases.contains_key(&target.name) {
            return Err(AdministrationError::Rejected(format!(
                "database {} exists",
                target.name
            )));
        }
        state.databases.insert(target.name.clone(), target.clone());
        Ok(())
    }

    fn use_database(&self, name: &str) -> GatewayResult<()> {
        self.record(Call::UseDatabase(name.to_string()))?;
        *self.selected.borrow_mut() = Some(name.to_string());
        Ok(())
    }

    fn disable_general_log(&self) -> GatewayResult<()> {
        self.record(Call::DisableGeneralLog)?;
        self.state.borrow_mut().general_log = false;
        Ok(())
    }

    fn set_timezone_utc(&self) -> GatewayResult<()> {
        self.record(Call::SetTimezoneUtc)?;
        self.state.borrow_mut().utc = true;
        Ok(())
    }

    fn set_sql_mode_strict(&self) -> GatewayResult<()> {
        self.record(Call::SetSqlModeStrict)?;
        self.state.borrow_mut().strict = true;
        Ok(())
    }

    fn user_exists(&self, username: &str) -> GatewayResult<bool> {
        self.record(Call::UserExists(username.to_string()))?;
        Ok(self.state.borrow().users.contains_key(username))
    }

    fn create_user(&self, username: &str, password: &str, host: &str) -> GatewayResult<DbUser> {
        self.record(Call::CreateUser {
            name: username.to_string(),
            host: host.to_string(),
        })?;
        let mut state = self.state.borrow_mut();
        if state.users.contains_key(username) {
            return Err(AdministrationError::Rejected(format!("user {username} exists")));
        }
        // Mimics a backend that ignores the password given at creation.
        let _ = password;
        state
            .users
            .insert(username.to_string(), (host.to_string(), String::new()));
        Ok(DbUser {
            name: username.to_string(),
            host: host.to_string(),
        })
    }

    fn update_password(&self, user: &DbUser, password: &str) -> GatewayResult<()> {
        self.record(Call::UpdatePassword(user.name.clone()))?;
        let mut state = self.state.borrow_mut();
        let entry = state
            .users
            .get_mut(&user.name)
            .ok_or_else(|| AdministrationError::UserNotFound(user.name.clone()))?;
        entry.1 = password.to_string();
        Ok(())
    }

    fn get_user(&self, username: &str) -> GatewayResult<DbUser> {
        self.record(Call::GetUser(username.to_string()))?;
        let state = self.state.borrow();
        let (host, _) = state
            .users
            .get(username)
            .ok_or_else(|| AdministrationError::UserNotFound(username.to_string()))?;
        Ok(DbUser {
            name: username.to_string(),
            host: host.clone(),
        })
    }

    fn grant(
        &self,
        user: &DbUser,
        privilege: Privilege,
        database_filter: &str,
        table_filter: &str,
    ) -> GatewayResult<()> {
        self.record(Call::Grant {
            user: user.name.clone(),
            privilege,
            database: database_filter.to_string(),
            table: table_filter.to_string(),
        })?;
        self.state.borrow_mut().grants.insert((
            user.name.clone(),
            privilege,
            format!("{database_filter}.{table_filter}"),
        ));
        Ok(())
    }

    fn table_exists(&self, name: &str) -> GatewayResult<bool> {
        self.record(Call::TableExists(name.to_string()))?;
        let key = (self.selected()?, name.to_string());
        Ok(self.state.borrow().tables.contains_key(&key))
    }

    fn create_table(&self, schema: &TableSchema) -> GatewayResult<()> {
        self.record(Call::CreateTable(schema.name.clone()))?;
        let key = (self.selected()?, schema.name.clone());
        let mut state = self.state.borrow_mut();
        if state.tables.contains_key(&key) {
            return Err(AdministrationError::Rejected(format!(
                "table {} exists",
                schema.name
            )));
        }
        state.tables.insert(key, 0);
        Ok(())
    }

    fn get_table(&self, name: &str) -> GatewayResult<TableHandle> {
        self.record(Call::GetTable(name.to_string()))?;
        let key = (self.selected()?, name.to_string());
        if !self.state.borrow().tables.contains_key(&key) {
            return Err(AdministrationError::TableNotFound(name.to_string()));
        }
        Ok(TableHandle {
            name: name.to_string(),
            primary_key: "database_migration_id".to_string(),
        })
    }

    fn count_rows(&self, table: &TableHandle) -> GatewayResult<u64> {
        self.record(Call::CountRows(table.name.clone()))?;
        let key = (self.selected()?, table.name.clone());
        self.state
            .borrow()
            .tables
            .get(&key)
            .copied()
            .ok_or_else(|| AdministrationError::TableNotFound(table.name.clone()))
    }

    fn insert_row(&self, table: &TableHandle) -> GatewayResult<u64> {
        self.record(Call::InsertRow(table.name.clone()))?;
        let key = (self.selected()?, table.name.clone());
        let mut state = self.state.borrow_mut();
        let rows = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| AdministrationError::TableNotFound(table.name.clone()))?;
        *rows += 1;
        let mut next_id = self.next_id.borrow_mut();
        *next_id += 1;
        Ok(*next_id)
    }
}

pub fn credential(username: &str, password: &str) -> RoleCredential {
    RoleCredential {
        host: "db1".to_string(),
        port: "3306".to_string(),
        database: "holistic".to_string(),
        username: username.to_string(),
        password: password.to_string(),
        pool_index: None,
    }
}

pub fn credentials() -> ResolvedCredentials {
    ResolvedCredentials {
        root: credential("root", "Root#Pass1"),
        migration: credential("mig", "Mig#Pass12"),
        write: credential("holistic_w", "Write#Pass1"),
        read: credential("holistic_r", "Read#Pass1"),
    }
}

pub fn config(data_dir: &Path, pool_size: u32) -> InstallerConfig {
    InstallerConfig {
        data_dir: data_dir.to_path_buf(),
        pool_size,
        ..InstallerConfig::default()
    }
}

pub fn plan(config: &InstallerConfig) -> ProvisioningPlan {
    ProvisioningPlan::build(credentials(), config).expect("valid plan")
}
