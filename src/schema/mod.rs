//! Statically declared table schemas
//!
//! Every table is an ordered list of typed columns plus the partition keys
//! supplied by the directory layout. The auto-managed base columns are
//! shared by all tables and never mapped from file bodies.

pub mod registry;

use std::fmt;

use serde::Serialize;

pub use registry::{
    DATA_PRODUCT, DATA_WEEK, LOADED_RECORDS, SourceTable, all_tables, lookup, source_tables,
};

/// Column types understood by the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    BigInt,
    Integer,
    Boolean,
    Date,
    Timestamp,
    Varchar(u32),
    Decimal(u8, u8),
}

impl ColumnType {
    /// SQL type name used in DDL and parameter casts
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Decimal(precision, scale) => format!("DECIMAL({precision},{scale})"),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

/// A single column declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// SQL default expression
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            default: None,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

/// Auto-managed columns present on every table
pub const BASE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", ColumnType::BigInt),
    ColumnDef::new("created_datetime", ColumnType::Timestamp)
        .not_null()
        .with_default("current_timestamp"),
    ColumnDef::new("modified_datetime", ColumnType::Timestamp)
        .not_null()
        .with_default("current_timestamp"),
];

/// Immutable description of one destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    pub table_name: &'static str,
    /// Declared columns, excluding [`BASE_COLUMNS`]
    pub columns: &'static [ColumnDef],
    /// Columns normally supplied by the partition path
    pub partition_keys: &'static [&'static str],
    /// Natural key used for upserts
    pub primary_key: &'static [&'static str],
}

impl SchemaDescriptor {
    /// All columns in table order, base columns first
    pub fn all_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        BASE_COLUMNS.iter().chain(self.columns.iter())
    }

    pub fn is_base_column(name: &str) -> bool {
        BASE_COLUMNS.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.all_columns().find(|c| c.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.contains(&name)
    }

    /// Columns that must appear in a file body whose path carries
    /// `partition_keys_present`, in table order
    pub fn expected_file_columns<'a, I>(&self, partition_keys_present: I) -> Vec<&'static str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<&str> = partition_keys_present.into_iter().collect();
        self.all_columns()
            .map(|c| c.name)
            .filter(|name| !Self::is_base_column(name))
            .filter(|name| !present.contains(name))
            .collect()
    }

    fn sequence_name(&self) -> String {
        format!("{}_id_seq", self.table_name)
    }

    /// DDL creating the id sequence and the table (DuckDB syntax)
    pub fn create_table_sql(&self) -> String {
        let mut lines = Vec::new();
        for column in self.all_columns() {
            let mut line = format!("    {} {}", quote_ident(column.name), column.column_type);
            if column.name == "id" {
                line.push_str(&format!(" DEFAULT nextval('{}')", self.sequence_name()));
            } else if let Some(default) = column.default {
                line.push_str(&format!(" DEFAULT {default}"));
            }
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
            lines.push(line);
        }
        if !self.primary_key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", quote_list(self.primary_key)));
        }

        format!(
            "CREATE SEQUENCE IF NOT EXISTS {seq} START 1;\nCREATE TABLE IF NOT EXISTS {table} (\n{body}\n);\n",
            seq = quote_ident(&self.sequence_name()),
            table = quote_ident(self.table_name),
            body = lines.join(",\n"),
        )
    }

    /// Parameterized upsert over `columns`, one `?` per column cast to its
    /// declared type. Conflicts on the primary key overwrite every other
    /// listed column.
    pub fn upsert_sql(&self, columns: &[&str]) -> Result<String, crate::error::StoreError> {
        let mut casts = Vec::with_capacity(columns.len());
        for name in columns {
            let column = self.column(name).ok_or_else(|| {
                crate::error::StoreError::Query(format!(
                    "column {name} is not declared on {}",
                    self.table_name
                ))
            })?;
            casts.push(format!("CAST(? AS {})", column.column_type));
        }

        let mut updates: Vec<String> = columns
            .iter()
            .filter(|name| !self.is_primary_key(name))
            .map(|name| format!("{col} = EXCLUDED.{col}", col = quote_ident(name)))
            .collect();
        updates.push(format!("{} = now()", quote_ident("modified_datetime")));

        Ok(format!(
            "INSERT INTO {table} ({cols}) VALUES ({casts}) ON CONFLICT ({pk}) DO UPDATE SET {updates}",
            table = quote_ident(self.table_name),
            cols = quote_list(columns),
            casts = casts.join(", "),
            pk = quote_list(self.primary_key),
            updates = updates.join(", "),
        ))
    }
}

/// Double-quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
