//! Code tables: label -> code lookups for VOC type, receipt type and service.
//!
//! Each table is a CSV file with a label column and a code column, both
//! named in the configuration. Any failure here is fatal to the run.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::api::logs::{log_info, log_success};
use crate::config::{CodeTableSource, ReferenceSettings};
use crate::error::{CsvError, ReferenceError, ReferenceResult};
use crate::parser::{parse_csv_file_auto, ParseResult};

/// Label -> code lookup. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeMapping {
    codes: HashMap<String, String>,
}

impl CodeMapping {
    /// Duplicate labels keep the last code seen.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            codes: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.codes.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Labels in sorted order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.codes.keys().cloned().collect();
        labels.sort();
        labels
    }
}

/// The three code tables used by validation and mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeTables {
    pub voc_type: CodeMapping,
    pub receipt_type: CodeMapping,
    pub service: CodeMapping,
}

/// Load all three tables. The first failure aborts.
pub fn load_code_tables(settings: &ReferenceSettings) -> ReferenceResult<CodeTables> {
    log_info("Loading VOC code mappings");

    let tables = CodeTables {
        voc_type: load_code_mapping(&settings.voc_type)?,
        receipt_type: load_code_mapping(&settings.receipt_type)?,
        service: load_code_mapping(&settings.service)?,
    };

    log_success(format!(
        "Code mappings loaded: {} VOC types, {} receipt types, {} services",
        tables.voc_type.len(),
        tables.receipt_type.len(),
        tables.service.len()
    ));
    Ok(tables)
}

/// Load one table from its CSV file.
pub fn load_code_mapping(source: &CodeTableSource) -> ReferenceResult<CodeMapping> {
    let parsed = parse_csv_file_auto(&source.path).map_err(|e| match e {
        CsvError::Io { source: io, .. } if io.kind() == ErrorKind::NotFound => ReferenceError::NotFound {
            path: source.path.clone(),
        },
        CsvError::EmptyFile | CsvError::NoHeaders => ReferenceError::EmptySource {
            path: source.path.clone(),
        },
        other => ReferenceError::Csv {
            path: source.path.clone(),
            source: other,
        },
    })?;

    mapping_from_table(&parsed, &source.path, &source.key_column, &source.value_column)
}

/// Build a mapping from an already parsed table.
pub fn mapping_from_table(
    table: &ParseResult,
    path: &Path,
    key_column: &str,
    value_column: &str,
) -> ReferenceResult<CodeMapping> {
    for column in [key_column, value_column] {
        if !table.has_column(column) {
            return Err(ReferenceError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    if table.records.is_empty() {
        return Err(ReferenceError::EmptySource {
            path: path.to_path_buf(),
        });
    }

    let pairs = table.records.iter().filter_map(|record| {
        let key = cell(record, key_column)?;
        let value = cell(record, value_column).unwrap_or_default();
        Some((key, value))
    });

    Ok(CodeMapping::from_pairs(pairs))
}

fn cell(record: &Value, column: &str) -> Option<String> {
    record
        .get(column)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn source(path: PathBuf) -> CodeTableSource {
        CodeTableSource {
            path,
            key_column: "name".into(),
            value_column: "code".into(),
        }
    }

    #[test]
    fn test_loads_label_to_code() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recv.csv");
        std::fs::write(&path, "name,code,desc\n전화,10,phone\n메일,20,mail\n").unwrap();

        let mapping = load_code_mapping(&source(path)).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("전화"), Some("10"));
        assert!(!mapping.contains("방문"));
    }

    #[test]
    fn test_duplicate_labels_keep_last_code() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc.csv");
        std::fs::write(&path, "name,code\nS1,1\nS1,2\n").unwrap();

        let mapping = load_code_mapping(&source(path)).unwrap();
        assert_eq!(mapping.get("S1"), Some("2"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_code_mapping(&source(dir.path().join("absent.csv"))).unwrap_err();
        assert!(matches!(err, ReferenceError::NotFound { .. }));
    }

    #[test]
    fn test_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("type.csv");
        std::fs::write(&path, "label,code\nA,1\n").unwrap();

        let err = load_code_mapping(&source(path)).unwrap_err();
        assert!(matches!(err, ReferenceError::MissingColumn { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_empty_sources() {
        let dir = tempdir().unwrap();
        let header_only = dir.path().join("header.csv");
        let blank = dir.path().join("blank.csv");
        std::fs::write(&header_only, "name,code\n").unwrap();
        std::fs::write(&blank, "").unwrap();

        assert!(matches!(
            load_code_mapping(&source(header_only)).unwrap_err(),
            ReferenceError::EmptySource { .. }
        ));
        assert!(matches!(
            load_code_mapping(&source(blank)).unwrap_err(),
            ReferenceError::EmptySource { .. }
        ));
    }

    #[test]
    fn test_labels_sorted() {
        let mapping = CodeMapping::from_pairs([("b", "2"), ("a", "1")]);
        assert_eq!(mapping.labels(), vec!["a", "b"]);
    }
}
