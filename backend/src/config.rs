//! Settings loaded from the environment (and `.env`, via `dotenvy`).
//!
//! Settings are read once in `main` and passed down explicitly.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::models::VocField;

/// Registrant / worker contact details stamped on every form record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerContext {
    pub employee_code: String,
    pub name: String,
    pub dept_code: String,
    pub dept_name: String,
    pub office_phone: String,
    pub mobile_phone: String,
}

/// A code table file and the columns holding the label and the code.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeTableSource {
    pub path: PathBuf,
    pub key_column: String,
    pub value_column: String,
}

/// The three code tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSettings {
    pub voc_type: CodeTableSource,
    pub receipt_type: CodeTableSource,
    pub service: CodeTableSource,
}

/// Credentials and endpoints of the VOC application. Only the submitting
/// run needs them, so they are loaded apart from [`Settings`].
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub login_id: String,
    pub login_password: String,
    pub login_type: String,
    pub login_url: String,
    pub voc_url: String,
    pub insert_url: String,
}

impl RemoteSettings {
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Ok(Self {
            login_id: vars.required("LOGIN_ID")?,
            login_password: vars.required("LOGIN_PWD")?,
            login_type: vars.optional("LOGIN_TYPE").unwrap_or_default(),
            login_url: vars.required("LOGIN_URL")?,
            voc_url: vars.required("VOC_URL")?,
            insert_url: vars.required("VOC_INSERT_URL")?,
        })
    }
}

/// Where the personnel directory comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorySettings {
    /// CSV export of the directory, plus an optional authorized-member list.
    File {
        path: PathBuf,
        auth_members_path: Option<PathBuf>,
    },
    /// PostgreSQL database (feature `postgres`).
    Database {
        url: String,
        directory_sql: Option<PathBuf>,
        auth_sql: Option<PathBuf>,
    },
}

/// Type inference settings.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub free_tier: bool,
    pub max_rpm: u32,
    pub max_rpd: u32,
    pub max_tpm: u64,
    pub reason_log_dir: PathBuf,
    pub request_delay: Duration,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            free_tier: true,
            max_rpm: 15,
            max_rpd: 1500,
            max_tpm: 1_000_000,
            reason_log_dir: PathBuf::from("log"),
            request_delay: Duration::from_secs(1),
        }
    }
}

/// Everything the validation pipeline needs from the outside world.
#[derive(Debug, Clone)]
pub struct Settings {
    pub worker: WorkerContext,
    pub references: ReferenceSettings,
    pub data_dir: PathBuf,
    pub required_fields: Vec<VocField>,
    pub directory: DirectorySettings,
    pub ai: AiSettings,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let references = Self::references_from(&vars)?;
        let worker = Self::worker_from(&vars)?;

        let required_fields = match vars.optional("REQUIRED_FIELDS") {
            Some(list) => parse_required_fields(&list)?,
            None => VocField::default_required(),
        };

        let directory = match vars.optional("DATABASE_URL") {
            Some(url) => DirectorySettings::Database {
                url,
                directory_sql: vars.optional("DIRECTORY_SQL_PATH").map(PathBuf::from),
                auth_sql: vars.optional("AUTH_SQL_PATH").map(PathBuf::from),
            },
            None => DirectorySettings::File {
                path: PathBuf::from(vars.required("DIRECTORY_FILE_PATH")?),
                auth_members_path: vars.optional("AUTH_MEMBERS_FILE_PATH").map(PathBuf::from),
            },
        };

        Ok(Self {
            worker,
            references,
            data_dir: PathBuf::from(vars.required("VOC_DATA_FILE_PATH")?),
            required_fields,
            directory,
            ai: Self::ai_from(&vars)?,
        })
    }

    fn references_from<F>(vars: &Vars<F>) -> ConfigResult<ReferenceSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table = |path: &str, key: &str, value: &str| -> ConfigResult<CodeTableSource> {
            Ok(CodeTableSource {
                path: PathBuf::from(vars.required(path)?),
                key_column: vars.required(key)?,
                value_column: vars.required(value)?,
            })
        };

        Ok(ReferenceSettings {
            voc_type: table("VOC_TYPE_FILE_PATH", "VOC_TYPE_KEY", "VOC_TYPE_VALUE")?,
            receipt_type: table("VOC_RECV_TYPE_FILE_PATH", "VOC_RECV_TYPE_KEY", "VOC_RECV_TYPE_VALUE")?,
            service: table("VOC_SERVICE_FILE_PATH", "VOC_SERVICE_KEY", "VOC_SERVICE_VALUE")?,
        })
    }

    fn worker_from<F>(vars: &Vars<F>) -> ConfigResult<WorkerContext>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(WorkerContext {
            employee_code: vars.required("WORKER_EMPCD")?.trim().to_string(),
            name: vars.required("WORKER_NAME")?.trim().to_string(),
            dept_code: vars.required("WORKER_DEPTCD")?.trim().to_string(),
            dept_name: vars.required("WORKER_DEPTNAME")?.trim().to_string(),
            // Phone numbers are sent exactly as configured
            office_phone: vars.optional("WORKER_OFFICE_TEL").unwrap_or_default(),
            mobile_phone: vars.optional("WORKER_MOBILE_TEL").unwrap_or_default(),
        })
    }

    fn ai_from<F>(vars: &Vars<F>) -> ConfigResult<AiSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AiSettings::default();

        Ok(AiSettings {
            api_key: vars.optional("GOOGLE_API_KEY"),
            model: vars.optional("GEMINI_MODEL").unwrap_or(defaults.model),
            free_tier: vars.parsed("AI_FREE_TIER", defaults.free_tier)?,
            max_rpm: vars.parsed("AI_MAX_RPM", defaults.max_rpm)?,
            max_rpd: vars.parsed("AI_MAX_RPD", defaults.max_rpd)?,
            max_tpm: vars.parsed("AI_MAX_TPM", defaults.max_tpm)?,
            reason_log_dir: vars
                .optional("AI_REASON_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reason_log_dir),
            request_delay: Duration::from_millis(
                vars.parsed("AI_REQUEST_DELAY_MS", defaults.request_delay.as_millis() as u64)?,
            ),
        })
    }
}

/// Parse a comma-separated list of column headers.
pub fn parse_required_fields(list: &str) -> ConfigResult<Vec<VocField>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<VocField>().map_err(|message| ConfigError::Invalid {
                var: "REQUIRED_FIELDS".to_string(),
                message,
            })
        })
        .collect()
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> ConfigResult<String> {
        self.optional(key)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}
