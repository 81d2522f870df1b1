use std::sync::{Mutex, MutexGuard};

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::schema::{quote_account_host, quote_ident, quote_literal};
use super::{DbUser, Gateway, GatewayResult, TableHandle, TableSchema};
use crate::error::AdministrationError;
use crate::types::{DatabaseTarget, Privilege, RoleCredential};

/// MySQL 8 default, which is strict.
const STRICT_SQL_MODE: &str = "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION";

/// Gateway over a single MySQL connection.
///
/// sqlx is async; a private current-thread runtime drives each call to
/// completion so the gateway stays blocking.
pub struct MysqlGateway {
    runtime: Runtime,
    conn: Mutex<MySqlConnection>,
    selected: Mutex<Option<String>>,
}

impl MysqlGateway {
    /// Connects with `credential`, without selecting a database.
    pub fn connect(credential: &RoleCredential) -> GatewayResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(AdministrationError::Runtime)?;

        let port = credential.port.parse::<u16>().map_err(|_| {
            AdministrationError::Rejected(format!("invalid port {:?}", credential.port))
        })?;
        let options = MySqlConnectOptions::new()
            .host(&credential.host)
            .port(port)
            .username(&credential.username)
            .password(&credential.password);

        debug!(
            "connecting to {}:{} as {}",
            credential.host, credential.port, credential.username
        );
        let conn = runtime.block_on(MySqlConnection::connect_with(&options))?;

        Ok(Self {
            runtime,
            conn: Mutex::new(conn),
            selected: Mutex::new(None),
        })
    }

    fn conn(&self) -> MutexGuard<'_, MySqlConnection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn selected_database(&self) -> GatewayResult<String> {
        self.selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(AdministrationError::NoDatabaseSelected)
    }

    fn execute(&self, sql: &str) -> GatewayResult<()> {
        debug!("executing: {sql}");
        self.execute_quiet(sql)
    }

    /// Like `execute`, for statements carrying a password.
    fn execute_quiet(&self, sql: &str) -> GatewayResult<()> {
        let mut conn = self.conn();
        self.runtime
            .block_on(async { sqlx::raw_sql(sql).execute(&mut *conn).await })?;
        Ok(())
    }

    fn count(&self, sql: &str, binds: &[&str]) -> GatewayResult<u64> {
        debug!("querying: {sql}");
        let mut conn = self.conn();
        let count = self.runtime.block_on(async {
            let mut query = sqlx::query_scalar::<_, i64>(sql);
            for bind in binds {
                query = query.bind(*bind);
            }
            query.fetch_one(&mut *conn).await
        })?;
        row_count(count)
    }

    fn optional_string(&self, sql: &str, binds: &[&str]) -> GatewayResult<Option<String>> {
        debug!("querying: {sql}");
        let mut conn = self.conn();
        let value = self.runtime.block_on(async {
            let mut query = sqlx::query_scalar::<_, String>(sql);
            for bind in binds {
                query = query.bind(*bind);
            }
            query.fetch_optional(&mut *conn).await
        })?;
        Ok(value)
    }

    fn account(user: &DbUser) -> GatewayResult<String> {
        Ok(format!(
            "{}@{}",
            quote_literal(&checked_name(&user.name)?),
            quote_account_host(&user.host)?
        ))
    }
}

/// COUNT(*) never goes negative; if it does, refuse rather than guess.
fn row_count(count: i64) -> GatewayResult<u64> {
    u64::try_from(count)
        .map_err(|_| AdministrationError::Rejected(format!("server returned negative count {count}")))
}

fn checked_name(name: &str) -> GatewayResult<String> {
    quote_ident(name)?;
    Ok(name.to_string())
}

impl Gateway for MysqlGateway {
    fn database_exists(&self, name: &str) -> GatewayResult<bool> {
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
            &[name],
        )?;
        Ok(count > 0)
    }

    fn create_database(&self, target: &DatabaseTarget) -> GatewayResult<()> {
        self.execute(&format!(
            "CREATE DATABASE {} CHARACTER SET {} COLLATE {}",
            quote_ident(&target.name)?,
            quote_ident(&target.character_set)?,
            quote_ident(&target.collation)?
        ))
    }

    fn use_database(&self, name: &str) -> GatewayResult<()> {
        self.execute(&format!("USE {}", quote_ident(name)?))?;
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = Some(name.to_string());
        Ok(())
    }

    fn disable_general_log(&self) -> GatewayResult<()> {
        self.execute("SET GLOBAL general_log = 'OFF'")
    }

    fn set_timezone_utc(&self) -> GatewayResult<()> {
        self.execute("SET GLOBAL time_zone = '+00:00'")?;
        self.execute("SET SESSION time_zone = '+00:00'")
    }

    fn set_sql_mode_strict(&self) -> GatewayResult<()> {
        self.execute(&format!("SET GLOBAL sql_mode = '{STRICT_SQL_MODE}'"))?;
        self.execute(&format!("SET SESSION sql_mode = '{STRICT_SQL_MODE}'"))
    }

    fn user_exists(&self, username: &str) -> GatewayResult<bool> {
        let count = self.count("SELECT COUNT(*) FROM mysql.user WHERE User = ?", &[username])?;
        Ok(count > 0)
    }

    fn create_user(&self, username: &str, password: &str, host: &str) -> GatewayResult<DbUser> {
        let user = DbUser {
            name: username.to_string(),
            host: host.to_string(),
        };
        let account = Self::account(&user)?;
        debug!("executing: CREATE USER {account} IDENTIFIED BY <redacted>");
        self.execute_quiet(&format!(
            "CREATE USER {account} IDENTIFIED BY {}",
            quote_literal(password)
        ))?;
        Ok(user)
    }

    fn update_password(&self, user: &DbUser, password: &str) -> GatewayResult<()> {
        let account = Self::account(user)?;
        debug!("executing: ALTER USER {account} IDENTIFIED BY <redacted>");
        self.execute_quiet(&format!(
            "ALTER USER {account} IDENTIFIED BY {}",
            quote_literal(password)
        ))
    }

    fn get_user(&self, username: &str) -> GatewayResult<DbUser> {
        let host = self
            .optional_string(
                "SELECT CAST(Host AS CHAR) FROM mysql.user WHERE User = ? ORDER BY Host LIMIT 1",
                &[username],
            )?
            .ok_or_else(|| AdministrationError::UserNotFound(username.to_string()))?;
        Ok(DbUser {
            name: username.to_string(),
            host,
        })
    }

    fn grant(
        &self,
        user: &DbUser,
        privilege: Privilege,
        database_filter: &str,
        table_filter: &str,
    ) -> GatewayResult<()> {
        let table = if table_filter == "*" {
            "*".to_string()
        } else {
            quote_ident(table_filter)?
        };
        self.execute(&format!(
            "GRANT {} ON {}.{} TO {}",
            privilege.as_sql(),
            quote_ident(database_filter)?,
            table,
            Self::account(user)?
        ))
    }

    fn table_exists(&self, name: &str) -> GatewayResult<bool> {
        let database = self.selected_database()?;
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
            &[database.as_str(), name],
        )?;
        Ok(count > 0)
    }

    fn create_table(&self, schema: &TableSchema) -> GatewayResult<()> {
        self.selected_database()?;
        self.execute(&schema.to_ddl()?)
    }

    fn get_table(&self, name: &str) -> GatewayResult<TableHandle> {
        if !self.table_exists(name)? {
            return Err(AdministrationError::TableNotFound(name.to_string()));
        }
        let database = self.selected_database()?;
        let primary_key = self
            .optional_string(
                "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.KEY_COLUMN_USAGE \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
                 ORDER BY ORDINAL_POSITION LIMIT 1",
                &[database.as_str(), name],
            )?
            .ok_or_else(|| AdministrationError::Rejected(format!("table {name} has no primary key")))?;
        Ok(TableHandle {
            name: name.to_string(),
            primary_key,
        })
    }

    fn count_rows(&self, table: &TableHandle) -> GatewayResult<u64> {
        self.count(&format!("SELECT COUNT(*) FROM {}", quote_ident(&table.name)?), &[])
    }

    fn insert_row(&self, table: &TableHandle) -> GatewayResult<u64> {
        let sql = format!("INSERT INTO {} () VALUES ()", quote_ident(&table.name)?);
        debug!("executing: {sql}");
        let mut conn = self.conn();
        let result = self
            .runtime
            .block_on(async { sqlx::query(&sql).execute(&mut *conn).await })?;
        Ok(result.last_insert_id())
    }
}
