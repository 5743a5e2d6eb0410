//! Where directory records come from.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{AuthMember, RawRecord};
use crate::config::DirectorySettings;
use crate::error::DirectoryResult;
use crate::parser::parse_csv_file_auto;

/// Read-only snapshot of the personnel directory.
pub trait DirectorySource {
    /// Every personnel record.
    fn fetch_directory(&self) -> impl Future<Output = DirectoryResult<Vec<RawRecord>>> + Send;

    /// Active operators allowed to register VOCs. Empty when unknown.
    fn fetch_auth_members(&self) -> impl Future<Output = DirectoryResult<Vec<AuthMember>>> + Send;
}

/// Directory exported to CSV files.
#[derive(Debug, Clone)]
pub struct FileDirectorySource {
    pub path: PathBuf,
    pub auth_members_path: Option<PathBuf>,
}

impl FileDirectorySource {
    fn read_records(path: &Path) -> DirectoryResult<Vec<RawRecord>> {
        let parsed = parse_csv_file_auto(path)?;
        Ok(parsed.records.iter().filter_map(to_raw_record).collect())
    }
}

impl DirectorySource for FileDirectorySource {
    async fn fetch_directory(&self) -> DirectoryResult<Vec<RawRecord>> {
        Self::read_records(&self.path)
    }

    async fn fetch_auth_members(&self) -> DirectoryResult<Vec<AuthMember>> {
        let Some(path) = &self.auth_members_path else {
            return Ok(Vec::new());
        };
        let records = Self::read_records(path)?;
        Ok(records.iter().filter_map(AuthMember::from_record).collect())
    }
}

fn to_raw_record(value: &Value) -> Option<RawRecord> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect(),
    )
}

/// Source chosen from [`DirectorySettings`] at runtime.
#[derive(Debug, Clone)]
pub enum AnyDirectorySource {
    File(FileDirectorySource),
    #[cfg(feature = "postgres")]
    Postgres(super::PgDirectorySource),
}

impl AnyDirectorySource {
    pub async fn connect(settings: &DirectorySettings) -> DirectoryResult<Self> {
        match settings {
            DirectorySettings::File { path, auth_members_path } => Ok(Self::File(FileDirectorySource {
                path: path.clone(),
                auth_members_path: auth_members_path.clone(),
            })),
            #[cfg(feature = "postgres")]
            DirectorySettings::Database {
                url,
                directory_sql,
                auth_sql,
            } => {
                let source =
                    super::PgDirectorySource::connect(url, directory_sql.as_deref(), auth_sql.as_deref()).await?;
                Ok(Self::Postgres(source))
            }
            #[cfg(not(feature = "postgres"))]
            DirectorySettings::Database { .. } => Err(crate::error::DirectoryError::Unavailable(
                "DATABASE_URL is set but vocload was built without the `postgres` feature".to_string(),
            )),
        }
    }
}

impl DirectorySource for AnyDirectorySource {
    async fn fetch_directory(&self) -> DirectoryResult<Vec<RawRecord>> {
        match self {
            Self::File(source) => source.fetch_directory().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(source) => source.fetch_directory().await,
        }
    }

    async fn fetch_auth_members(&self) -> DirectoryResult<Vec<AuthMember>> {
        match self {
            Self::File(source) => source.fetch_auth_members().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(source) => source.fetch_auth_members().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_source_reads_records_and_members() {
        let dir = tempdir().unwrap();
        let insa = dir.path().join("insa.csv");
        let auth = dir.path().join("auth.csv");
        std::fs::write(&insa, "hname,empcd,deptcd\nKim,E1,D1\nLee,E2,D2\n").unwrap();
        std::fs::write(&auth, "member_id,auth\nop1,SM\n").unwrap();

        let source = FileDirectorySource {
            path: insa,
            auth_members_path: Some(auth),
        };

        let records = source.fetch_directory().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["empcd"], "E2");

        let members = source.fetch_auth_members().await.unwrap();
        assert_eq!(members, vec![AuthMember { member_id: "op1".into(), auth: "SM".into() }]);
    }

    #[tokio::test]
    async fn test_file_source_without_member_list() {
        let dir = tempdir().unwrap();
        let insa = dir.path().join("insa.csv");
        std::fs::write(&insa, "hname\nKim\n").unwrap();

        let source = FileDirectorySource {
            path: insa,
            auth_members_path: None,
        };
        assert!(source.fetch_auth_members().await.unwrap().is_empty());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_database_settings_need_feature() {
        let settings = DirectorySettings::Database {
            url: "postgres://localhost/insa".into(),
            directory_sql: None,
            auth_sql: None,
        };
        let err = AnyDirectorySource::connect(&settings).await.unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }
}
