use crate::error::AdministrationError;
use crate::types::SchemaTrackingRecord;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    UInt64,
    Int64,
}

impl ColumnType {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnType::UInt64 => "BIGINT UNSIGNED",
            ColumnType::Int64 => "BIGINT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnType,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub default: Option<i64>,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            auto_increment: false,
            primary_key: false,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// The schema version bookkeeping table.
    #[must_use]
    pub fn database_migration() -> Self {
        Self {
            name: SchemaTrackingRecord::TABLE.to_string(),
            columns: vec![
                ColumnSpec {
                    auto_increment: true,
                    primary_key: true,
                    ..ColumnSpec::new("database_migration_id", ColumnType::UInt64)
                },
                ColumnSpec {
                    default: Some(SchemaTrackingRecord::DEFAULT_CURRENT),
                    ..ColumnSpec::new("current", ColumnType::Int64)
                },
                ColumnSpec {
                    default: Some(SchemaTrackingRecord::DEFAULT_DESIRED),
                    ..ColumnSpec::new("desired", ColumnType::Int64)
                },
            ],
        }
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    /// Renders `CREATE TABLE` DDL.
    pub fn to_ddl(&self) -> Result<String, AdministrationError> {
        let mut lines = Vec::with_capacity(self.columns.len() + 1);
        for column in &self.columns {
            let mut line = format!("{} {} NOT NULL", quote_ident(&column.name)?, column.kind.as_sql());
            if column.auto_increment {
                line.push_str(" AUTO_INCREMENT");
            }
            if let Some(default) = column.default {
                line.push_str(&format!(" DEFAULT {default}"));
            }
            lines.push(line);
        }
        if let Some(pk) = self.primary_key() {
            lines.push(format!("PRIMARY KEY ({})", quote_ident(pk)?));
        }
        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_ident(&self.name)?,
            lines.join(",\n    ")
        ))
    }
}

/// Backtick-quotes an identifier. Only `[A-Za-z0-9_]` is accepted.
pub fn quote_ident(ident: &str) -> Result<String, AdministrationError> {
    if ident.is_empty() || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AdministrationError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("`{ident}`"))
}

/// Single-quoted string literal for statements that cannot take bind parameters.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Host part of an account name; `%` and `.` are allowed on top of identifier characters.
pub fn quote_account_host(host: &str) -> Result<String, AdministrationError> {
    validation::validate_account_host(host)
        .map_err(|_| AdministrationError::InvalidIdentifier(host.to_string()))?;
    Ok(format!("'{host}'"))
}
