//! Parameterized SQL statements for the tabular adapter.
//!
//! Values only ever travel as [`SqlParam`]s bound to `?N` placeholders.
//! Identifiers (table and column names) cannot be bound in SQL, so they come
//! from a [`TableLayout`] whose names were checked against
//! [`IDENTIFIER_PATTERN`] when the adapter was built, and are double-quoted.

use regex::Regex;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use serde_json::Value;

use crate::error::{BackendError, BackendResult};
use crate::query::{BackendQuery, Operator};
use crate::types::{FieldType, RecordSchema};
use crate::validation::ScalarRef;

/// Pattern every table and column name must match.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

/// Column holding the record identifier.
pub const ID_COLUMN: &str = "id";

/// Column holding the serialized access policy.
pub const POLICY_COLUMN: &str = "access_policy";

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text parameter.
    Text(String),
    /// Integer parameter.
    Integer(i64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Converts a stored field value to a parameter for `column`.
    ///
    /// The value must already have the column's representation: integers
    /// for integer columns and strings for text columns. Nothing is coerced,
    /// so a record reads back exactly as it was written.
    pub fn for_column(column: &Column, value: &Value) -> BackendResult<Self> {
        let param = match value {
            Value::Null => Some(SqlParam::Null),
            Value::Number(n) if column.field_type == FieldType::Integer => {
                n.as_i64().map(SqlParam::Integer)
            }
            Value::String(s) if column.field_type != FieldType::Integer => {
                Some(SqlParam::Text(s.clone()))
            }
            _ => None,
        };
        param.ok_or_else(|| {
            configuration(format!(
                "column '{}' holds {} values, got {}",
                column.name,
                column.field_type,
                value_kind(value)
            ))
        })
    }
}

impl From<ScalarRef<'_>> for SqlParam {
    fn from(value: ScalarRef<'_>) -> Self {
        match value {
            ScalarRef::Text(s) => SqlParam::Text(s.to_string()),
            ScalarRef::Integer(i) => SqlParam::Integer(i),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            SqlParam::Null => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

/// SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// Statement text containing only quoted identifiers and placeholders.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    /// Creates a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter and returns its placeholder.
    pub fn add_param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("?{}", self.params.len())
    }

    /// Returns the parameters as trait objects for rusqlite.
    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p as &dyn ToSql).collect()
    }
}

/// A column of the tabular store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared field type.
    pub field_type: FieldType,
}

impl Column {
    /// Returns the SQLite type affinity of the column.
    pub fn sql_type(&self) -> &'static str {
        match self.field_type {
            FieldType::Integer => "INTEGER",
            _ => "TEXT",
        }
    }
}

/// Checked table and column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    table: String,
    columns: Vec<Column>,
}

impl TableLayout {
    /// Builds a layout from a schema, checking every name.
    pub fn new(table: &str, schema: &RecordSchema, pattern: &Regex) -> BackendResult<Self> {
        check_identifier(table, pattern)?;
        let mut columns = Vec::with_capacity(schema.len());
        for spec in schema.fields() {
            check_identifier(&spec.name, pattern)?;
            if spec.name == ID_COLUMN || spec.name == POLICY_COLUMN {
                return Err(configuration(format!(
                    "field '{}' collides with a reserved column",
                    spec.name
                )));
            }
            columns.push(Column {
                name: spec.name.clone(),
                field_type: spec.field_type,
            });
        }
        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the data columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns true if `name` is a data column.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Builds the `CREATE TABLE` statement.
    pub fn create_table(&self) -> SqlStatement {
        let mut columns = vec![format!("{} PRIMARY KEY", quote(ID_COLUMN))];
        columns.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), c.sql_type())),
        );
        columns.push(format!("{} TEXT NOT NULL DEFAULT '{{}}'", quote(POLICY_COLUMN)));

        SqlStatement::new(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote(&self.table),
            columns.join(",\n    ")
        ))
    }

    /// Builds the `CREATE INDEX` statement for a column.
    pub fn create_index(&self, column: &str) -> BackendResult<SqlStatement> {
        self.require_column(column)?;
        let index = format!("idx_{}_{}", self.table, column);
        Ok(SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&index),
            quote(&self.table),
            quote(column)
        )))
    }

    /// Builds the parameterized `SELECT` for a backend query.
    ///
    /// Selected columns are the identifier, the projected data columns and
    /// the policy column, in that order.
    pub fn select(&self, query: &BackendQuery) -> BackendResult<(SqlStatement, Vec<Column>)> {
        self.require_column(query.field())?;

        let projected: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| query.projection().iter().any(|p| p == &c.name))
            .cloned()
            .collect();
        if let Some(missing) = query
            .projection()
            .iter()
            .find(|p| !self.has_column(p.as_str()))
        {
            return Err(configuration(format!(
                "table '{}' has no column '{}'",
                self.table, missing
            )));
        }

        let mut select_list = vec![quote(ID_COLUMN)];
        select_list.extend(projected.iter().map(|c| quote(&c.name)));
        select_list.push(quote(POLICY_COLUMN));

        let mut statement = SqlStatement::new(String::new());
        let placeholder = statement.add_param(SqlParam::from(query.value().as_scalar()));
        let comparison = match query.operator() {
            Operator::Equals => "=",
        };
        statement.sql = format!(
            "SELECT {} FROM {} WHERE {} {} {} ORDER BY rowid",
            select_list.join(", "),
            quote(&self.table),
            quote(query.field()),
            comparison,
            placeholder
        );

        Ok((statement, projected))
    }

    /// Builds the upsert statement for one record.
    pub fn upsert(
        &self,
        id: SqlParam,
        fields: &serde_json::Map<String, Value>,
        policy_json: String,
    ) -> BackendResult<SqlStatement> {
        let mut statement = SqlStatement::new(String::new());
        let mut names = vec![quote(ID_COLUMN)];
        let mut placeholders = vec![statement.add_param(id)];

        for column in &self.columns {
            let param = match fields.get(&column.name) {
                Some(value) => SqlParam::for_column(column, value)?,
                None => SqlParam::Null,
            };
            names.push(quote(&column.name));
            placeholders.push(statement.add_param(param));
        }
        names.push(quote(POLICY_COLUMN));
        placeholders.push(statement.add_param(SqlParam::Text(policy_json)));

        statement.sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote(&self.table),
            names.join(", "),
            placeholders.join(", ")
        );
        Ok(statement)
    }

    fn require_column(&self, column: &str) -> BackendResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(configuration(format!(
                "table '{}' has no column '{}'",
                self.table, column
            )))
        }
    }
}

/// Double-quotes a checked identifier.
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn check_identifier(name: &str, pattern: &Regex) -> BackendResult<()> {
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(configuration(format!("invalid identifier '{}'", name)))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.as_i64().is_some() => "an integer",
        Value::Number(_) => "a float",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn configuration(message: String) -> BackendError {
    BackendError::Configuration {
        backend_name: "sqlite".to_string(),
        message,
    }
}
