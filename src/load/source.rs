//! CSV row source.
//!
//! The source is restartable: every call to [`RowSource::rows`] reopens the
//! file, so a benchmark can feed the same input to several strategies in turn.

use crate::error::LoadError;
use crate::schema::{Row, Schema};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone)]
pub struct RowSource {
    path: PathBuf,
    schema: Schema,
}

impl RowSource {
    /// Bind a CSV file to the schema its records are parsed against.
    ///
    /// The file must exist; it is not read until rows are requested.
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self, LoadError> {
        let path = path.into();
        if !path.is_file() {
            return Err(LoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source file {} not found", path.display()),
            )));
        }
        Ok(Self { path, schema })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Lazy iterator over the typed rows, header record skipped.
    pub fn rows(&self) -> Result<RowIter, LoadError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        Ok(RowIter {
            records: reader.into_records(),
            schema: self.schema.clone(),
        })
    }

    /// Read every row into memory for strategies that need random access.
    pub fn load_all(&self) -> Result<Vec<Row>, LoadError> {
        let rows = self.rows()?.collect::<Result<Vec<_>, _>>()?;
        log::debug!("materialized {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    /// Raw file body positioned just past the header line.
    pub async fn body(&self) -> Result<BufReader<tokio::fs::File>, LoadError> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        let mut header = String::new();
        reader.read_line(&mut header).await?;
        log::trace!("skipped header: {}", header.trim_end());
        Ok(reader)
    }
}

/// Iterator returned by [`RowSource::rows`].
pub struct RowIter {
    records: csv::StringRecordsIntoIter<File>,
    schema: Schema,
}

impl Iterator for RowIter {
    type Item = Result<Row, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        Some(Row::parse(&self.schema, &record, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn schema() -> Schema {
        Schema::parse("id:int,label:text").unwrap()
    }

    #[test]
    fn test_header_is_skipped() {
        let file = write_csv("id,label\n1,one\n2,two\n");
        let source = RowSource::open(file.path(), schema()).unwrap();
        let rows = source.load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values()[0], Value::Integer(1));
        assert_eq!(rows[1].values()[1], Value::Text("two".into()));
    }

    #[test]
    fn test_rows_is_restartable() {
        let file = write_csv("id,label\n1,one\n2,two\n3,three\n");
        let source = RowSource::open(file.path(), schema()).unwrap();
        assert_eq!(source.rows().unwrap().count(), 3);
        assert_eq!(source.rows().unwrap().count(), 3);
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = write_csv("id,label\n");
        let source = RowSource::open(file.path(), schema()).unwrap();
        assert!(source.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let file = write_csv("id,label\n1,one\n2\n");
        let source = RowSource::open(file.path(), schema()).unwrap();
        let results: Vec<_> = source.rows().unwrap().collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(LoadError::MalformedRow { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(RowSource::open("/nonexistent/bulk_test.csv", schema()).is_err());
    }

    #[tokio::test]
    async fn test_body_starts_after_header() {
        use tokio::io::AsyncReadExt;

        let file = write_csv("id,label\n1,one\n");
        let source = RowSource::open(file.path(), schema()).unwrap();
        let mut body = String::new();
        source.body().await.unwrap().read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "1,one\n");
    }
}
