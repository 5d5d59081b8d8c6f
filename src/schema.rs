//! Destination schema and the typed row model.
//!
//! A [`Schema`] describes the columns of the destination table in order. Rows
//! read from the source are parsed against it so every strategy sees the same
//! typed values, whether it binds them one at a time, as a multi-row VALUES
//! list, or as parallel column arrays for UNNEST.

use crate::error::LoadError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// PostgreSQL column types supported by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Timestamp,
    Integer,
    Double,
    Text,
}

impl ColumnType {
    /// Type name used for `$n::<type>[]` casts in UNNEST statements.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Integer => "int",
            ColumnType::Double => "double precision",
            ColumnType::Text => "text",
        }
    }
}

impl FromStr for ColumnType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamptz" | "timestamp" => Ok(ColumnType::Timestamp),
            "int" | "int4" | "integer" => Ok(ColumnType::Integer),
            "double" | "float8" | "double precision" => Ok(ColumnType::Double),
            "text" | "varchar" => Ok(ColumnType::Text),
            other => Err(LoadError::Config(format!(
                "unsupported column type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered column layout of the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self, LoadError> {
        if columns.is_empty() {
            return Err(LoadError::Config("schema must have at least one column".into()));
        }
        for column in &columns {
            validate_identifier(&column.name)?;
        }
        Ok(Self { columns })
    }

    /// Layout of the `bulk_test` benchmark table created by the migrations.
    pub fn bulk_test() -> Self {
        let mut columns = vec![
            Column::new("time", ColumnType::Timestamp),
            Column::new("device_id", ColumnType::Integer),
        ];
        for i in 1..=4 {
            columns.push(Column::new(format!("val{i}"), ColumnType::Integer));
        }
        for i in 5..=7 {
            columns.push(Column::new(format!("val{i}"), ColumnType::Double));
        }
        for i in 8..=9 {
            columns.push(Column::new(format!("val{i}"), ColumnType::Text));
        }
        Self { columns }
    }

    /// Parse a `name:type,name:type` descriptor.
    pub fn parse(descriptor: &str) -> Result<Self, LoadError> {
        let columns = descriptor
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                let (name, ty) = part.split_once(':').ok_or_else(|| {
                    LoadError::Config(format!("column `{}` is missing a type", part.trim()))
                })?;
                Ok(Column::new(name.trim(), ty.parse()?))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Comma-separated, quoted column list for INSERT and COPY statements.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Timestamp(DateTime<Utc>),
    Integer(i32),
    Double(f64),
    Text(String),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Timestamp(_) => ColumnType::Timestamp,
            Value::Integer(_) => ColumnType::Integer,
            Value::Double(_) => ColumnType::Double,
            Value::Text(_) => ColumnType::Text,
        }
    }

    /// Parse one raw CSV field as the given column type.
    ///
    /// Timestamps without an offset are read as UTC, the session time zone
    /// COPY runs under.
    pub fn parse(ty: ColumnType, raw: &str) -> Result<Self, String> {
        match ty {
            ColumnType::Timestamp => dateparser::parse_with_timezone(raw.trim(), &Utc)
                .map(Value::Timestamp)
                .map_err(|e| format!("invalid timestamp `{raw}`: {e}")),
            ColumnType::Integer => raw
                .trim()
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|e| format!("invalid integer `{raw}`: {e}")),
            ColumnType::Double => raw
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| format!("invalid double `{raw}`: {e}")),
            ColumnType::Text => Ok(Value::Text(raw.to_string())),
        }
    }
}

/// An ordered, fixed-arity tuple of values matching a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Parse a CSV record against the schema.
    ///
    /// `line` is the 1-based line number in the source file, used for error
    /// messages only.
    pub fn parse(schema: &Schema, record: &csv::StringRecord, line: u64) -> Result<Self, LoadError> {
        if record.len() != schema.arity() {
            return Err(LoadError::MalformedRow {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    schema.arity(),
                    record.len()
                ),
            });
        }

        let values = schema
            .columns()
            .iter()
            .zip(record.iter())
            .map(|(column, raw)| {
                Value::parse(column.ty, raw).map_err(|reason| LoadError::MalformedRow {
                    line,
                    reason: format!("column {}: {}", column.name, reason),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern compiles")
    })
}

/// Reject anything that is not a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<(), LoadError> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(LoadError::Config(format!("invalid identifier `{name}`")))
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Destination table name, optionally schema-qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let raw = raw.trim();
        let (schema, table) = match raw.split_once('.') {
            Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
            None => (None, raw.to_string()),
        };
        if let Some(schema) = &schema {
            validate_identifier(schema)?;
        }
        validate_identifier(&table)?;
        Ok(Self { schema, table })
    }

    /// Quoted form safe to splice into statement text.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.table)),
            None => quote_identifier(&self.table),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_test_layout() {
        let schema = Schema::bulk_test();
        assert_eq!(schema.arity(), 11);
        assert_eq!(schema.columns()[0].ty, ColumnType::Timestamp);
        assert_eq!(schema.columns()[6].name, "val5");
        assert_eq!(schema.columns()[6].ty, ColumnType::Double);
        assert_eq!(schema.columns()[10].ty, ColumnType::Text);
        assert!(schema.column_list().starts_with("\"time\", \"device_id\""));
    }

    #[test]
    fn test_parse_descriptor() {
        let schema = Schema::parse("ts:timestamptz, id:int,reading:float8,label:text").unwrap();
        assert_eq!(schema.arity(), 4);
        assert_eq!(schema.columns()[2].ty, ColumnType::Double);

        assert!(Schema::parse("").is_err());
        assert!(Schema::parse("id").is_err());
        assert!(Schema::parse("id:uuid").is_err());
        assert!(Schema::parse("bad-name:int").is_err());
    }

    #[test]
    fn test_row_parse() {
        let schema = Schema::parse("ts:timestamptz,id:int,reading:double,label:text").unwrap();
        let record = csv::StringRecord::from(vec!["2024-01-01T00:00:00+00:00", "7", "1.5", "a,b"]);
        let row = Row::parse(&schema, &record, 2).unwrap();
        assert_eq!(row.len(), 4);
        assert_eq!(row.values()[1], Value::Integer(7));
        assert_eq!(row.values()[2], Value::Double(1.5));
        assert_eq!(row.values()[3], Value::Text("a,b".into()));
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        use chrono::TimeZone;

        let expected = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Value::parse(ColumnType::Timestamp, "2020-01-01 00:00:00").unwrap(),
            Value::Timestamp(expected)
        );
        assert_eq!(
            Value::parse(ColumnType::Timestamp, "2020-01-01T02:00:00+02:00").unwrap(),
            Value::Timestamp(expected)
        );
    }

    #[test]
    fn test_row_parse_rejects_wrong_arity() {
        let schema = Schema::parse("id:int,label:text").unwrap();
        let record = csv::StringRecord::from(vec!["1"]);
        match Row::parse(&schema, &record, 5) {
            Err(LoadError::MalformedRow { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_row_parse_rejects_bad_integer() {
        let schema = Schema::parse("id:int").unwrap();
        let record = csv::StringRecord::from(vec!["seven"]);
        assert!(matches!(
            Row::parse(&schema, &record, 3),
            Err(LoadError::MalformedRow { line: 3, .. })
        ));
    }

    #[test]
    fn test_table_name() {
        assert_eq!(TableName::parse("bulk_test").unwrap().quoted(), "\"bulk_test\"");
        assert_eq!(
            TableName::parse("bench.bulk_test").unwrap().quoted(),
            "\"bench\".\"bulk_test\""
        );
        assert!(TableName::parse("bulk_test; DROP TABLE x").is_err());
        assert!(TableName::parse("a.b.c").is_err());
    }
}
