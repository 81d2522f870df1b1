mod mysql;
pub mod schema;

pub use mysql::MysqlGateway;
pub use schema::{ColumnSpec, ColumnType, TableSchema};

use crate::error::AdministrationError;
use crate::types::{DatabaseTarget, Privilege};

pub type GatewayResult<T> = std::result::Result<T, AdministrationError>;

/// A server principal as `'name'@'host'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbUser {
    pub name: String,
    pub host: String,
}

/// A table in the currently selected database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    pub name: String,
    pub primary_key: String,
}

/// Gateway defines the database administration interface the provisioner drives.
///
/// Every call blocks until the server has answered. Retries and timeouts are
/// the implementation's business.
pub trait Gateway {
    // Database operations
    fn database_exists(&self, name: &str) -> GatewayResult<bool>;
    fn create_database(&self, target: &DatabaseTarget) -> GatewayResult<()>;
    fn use_database(&self, name: &str) -> GatewayResult<()>;

    // Server hygiene
    fn disable_general_log(&self) -> GatewayResult<()>;
    fn set_timezone_utc(&self) -> GatewayResult<()>;
    fn set_sql_mode_strict(&self) -> GatewayResult<()>;

    // User operations
    fn user_exists(&self, username: &str) -> GatewayResult<bool>;
    fn create_user(&self, username: &str, password: &str, host: &str) -> GatewayResult<DbUser>;
    fn update_password(&self, user: &DbUser, password: &str) -> GatewayResult<()>;
    fn get_user(&self, username: &str) -> GatewayResult<DbUser>;
    fn grant(
        &self,
        user: &DbUser,
        privilege: Privilege,
        database_filter: &str,
        table_filter: &str,
    ) -> GatewayResult<()>;

    // Table operations, against the database selected by `use_database`
    fn table_exists(&self, name: &str) -> GatewayResult<bool>;
    fn create_table(&self, schema: &TableSchema) -> GatewayResult<()>;
    fn get_table(&self, name: &str) -> GatewayResult<TableHandle>;
    fn count_rows(&self, table: &TableHandle) -> GatewayResult<u64>;
    /// Inserts a row of column defaults and returns its primary key.
    fn insert_row(&self, table: &TableHandle) -> GatewayResult<u64>;
}
