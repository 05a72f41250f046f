//! CSV header validation against a table schema
//!
//! Only header names are compared (case-sensitive, exact match). A file whose
//! header differs from the expected column set is rejected on its own; a file
//! that cannot be read stops validation of the rest of the table.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::ingest::DiscoveredFile;
use crate::partition::PartitionPath;
use crate::schema::SchemaDescriptor;

/// Outcome of comparing one header with the expected columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderCheck {
    /// Expected but absent from the header
    pub missing: BTreeSet<String>,
    /// Present in the header but not expected
    pub extra: BTreeSet<String>,
}

impl HeaderMismatch {
    pub fn to_error(&self) -> IngestError {
        IngestError::SchemaMismatch {
            path: PathBuf::from(&self.relative_path),
            missing: self.missing.clone(),
            extra: self.extra.clone(),
        }
    }
}

impl HeaderCheck {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compare header names with the expected columns
pub fn validate<S: AsRef<str>>(header: &[S], expected: &[&str]) -> HeaderCheck {
    let actual: BTreeSet<&str> = header.iter().map(|h| h.as_ref()).collect();
    let expected: BTreeSet<&str> = expected.iter().copied().collect();

    HeaderCheck {
        missing: expected
            .difference(&actual)
            .map(|s| s.to_string())
            .collect(),
        extra: actual
            .difference(&expected)
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Read only the header row of a CSV file
pub fn read_header(path: &Path) -> Result<Vec<String>, IngestError> {
    let read_failure = |reason: String| IngestError::ReadFailure {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| read_failure(e.to_string()))?;
    let header = reader.headers().map_err(|e| read_failure(e.to_string()))?;
    if header.is_empty() {
        return Err(read_failure("no header row".to_string()));
    }

    Ok(header.iter().map(|h| h.to_string()).collect())
}

/// A file whose header matched; ready to load
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file: DiscoveredFile,
    pub partition: PartitionPath,
    /// Header names in file order; this is the load column order
    pub columns: Vec<String>,
}

/// A file excluded from loading because of its header
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMismatch {
    pub relative_path: String,
    pub missing: BTreeSet<String>,
    pub extra: BTreeSet<String>,
}

/// Validation results for one table
#[derive(Debug, Default)]
pub struct TableValidation {
    pub accepted: Vec<ValidatedFile>,
    pub rejected: Vec<HeaderMismatch>,
    /// Set when a file could not be read; files after it were not checked
    pub read_failure: Option<IngestError>,
}

impl TableValidation {
    pub fn is_ok(&self) -> bool {
        self.rejected.is_empty() && self.read_failure.is_none()
    }
}

/// Validate every file of one table
pub fn validate_table(schema: &SchemaDescriptor, files: Vec<DiscoveredFile>) -> TableValidation {
    let mut result = TableValidation::default();

    for file in files {
        let header = match read_header(&file.path) {
            Ok(header) => header,
            Err(e) => {
                warn!(table = schema.table_name, error = %e, "Aborting header validation");
                result.read_failure = Some(e);
                break;
            }
        };

        let partition = file.partition();
        let expected = schema.expected_file_columns(partition.keys());
        let check = validate(&header, &expected);

        if check.is_ok() {
            debug!(table = schema.table_name, file = %file.relative_path, "Header ok");
            result.accepted.push(ValidatedFile {
                file,
                partition,
                columns: header,
            });
        } else {
            let mismatch = HeaderMismatch {
                relative_path: file.relative_path,
                missing: check.missing,
                extra: check.extra,
            };
            warn!(
                table = schema.table_name,
                missing = mismatch.missing.len(),
                extra = mismatch.extra.len(),
                "{}",
                mismatch.to_error()
            );
            result.rejected.push(mismatch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry::CATEGORY_TREE_V2_LATEST;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_renamed_column_reported_both_ways() {
        let check = validate(&["asin", "Revenue"], &["asin", "revenue"]);
        assert!(!check.is_ok());
        assert_eq!(check.missing, BTreeSet::from(["revenue".to_string()]));
        assert_eq!(check.extra, BTreeSet::from(["Revenue".to_string()]));
    }

    #[test]
    fn test_order_does_not_matter() {
        assert!(validate(&["b", "a"], &["a", "b"]).is_ok());
    }

    #[test]
    fn test_read_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "\"asin\",price\n\"B0\",1.5\n").unwrap();
        assert_eq!(read_header(&path).unwrap(), vec!["asin", "price"]);

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            read_header(&empty),
            Err(IngestError::ReadFailure { .. })
        ));
    }

    fn write_file(dir: &TempDir, relative: &str, contents: &str) -> DiscoveredFile {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        DiscoveredFile::new(path, relative, contents.len() as u64)
    }

    #[test]
    fn test_validate_table_rejects_only_bad_files() {
        let dir = TempDir::new().unwrap();
        let columns: Vec<&str> = CATEGORY_TREE_V2_LATEST.expected_file_columns(["marketplace"]);
        let good_header = columns.join(",");
        let bad_header = good_header.replace("category_name", "categoryName");

        let files = vec![
            write_file(&dir, "marketplace=US/a.csv", &format!("{good_header}\n")),
            write_file(&dir, "marketplace=US/b.csv", &format!("{bad_header}\n")),
            write_file(&dir, "marketplace=DE/c.csv", &format!("{good_header}\n")),
        ];

        let result = validate_table(&CATEGORY_TREE_V2_LATEST, files);
        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].relative_path, "marketplace=US/b.csv");
        assert!(result.rejected[0].missing.contains("category_name"));
        assert!(result.rejected[0].extra.contains("categoryName"));
        assert!(result.read_failure.is_none());
        assert!(!result.is_ok());

        let err = result.rejected[0].to_error();
        assert!(matches!(err, IngestError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("marketplace=US/b.csv"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_read_failure_stops_validation() {
        let dir = TempDir::new().unwrap();
        let header = CATEGORY_TREE_V2_LATEST
            .expected_file_columns(["marketplace"])
            .join(",");
        let mut files = vec![write_file(&dir, "marketplace=US/a.csv", &format!("{header}\n"))];
        files.push(DiscoveredFile::new(
            dir.path().join("marketplace=US/missing.csv"),
            "marketplace=US/missing.csv",
            0,
        ));
        files.push(write_file(&dir, "marketplace=US/z.csv", &format!("{header}\n")));

        let result = validate_table(&CATEGORY_TREE_V2_LATEST, files);
        assert_eq!(result.accepted.len(), 1);
        assert!(matches!(
            result.read_failure,
            Some(IngestError::ReadFailure { .. })
        ));
    }
}
