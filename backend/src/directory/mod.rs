//! Personnel directory: name -> employee lookups.
//!
//! The directory is fetched once from a [`DirectorySource`] as loosely typed
//! records (column name -> value) and indexed into [`DirectoryEntry`] values.
//!
//! # Duplicate names
//!
//! Names are not unique in practice. The index keeps the first record seen
//! for a name and remembers the name as ambiguous so callers can warn; which
//! employee should win is still an open product decision.

#[cfg(feature = "postgres")]
mod postgres;
mod source;

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::api::logs::{log_info, log_warning};

#[cfg(feature = "postgres")]
pub use postgres::PgDirectorySource;
pub use source::{AnyDirectorySource, DirectorySource, FileDirectorySource};

/// One raw directory record: column name -> value.
pub type RawRecord = HashMap<String, String>;

/// Column names used by the personnel export.
pub mod columns {
    pub const NAME: &str = "hname";
    pub const EMPLOYEE_CODE: &str = "empcd";
    pub const DEPT_CODE: &str = "deptcd";
    pub const DEPT_NAME: &str = "deptcd_disp";
    pub const OFFICE_PHONE: &str = "office_phone";
    pub const MOBILE_PHONE: &str = "handpon";
    pub const MEMBER_ID: &str = "member_id";
    pub const AUTH: &str = "auth";
}

/// One employee. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub employee_code: String,
    pub dept_code: String,
    pub dept_name: String,
    pub office_phone: String,
    pub mobile_phone: String,
}

impl DirectoryEntry {
    /// `None` when the record has no usable name.
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let field = |key: &str| record.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let name = field(columns::NAME);
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name,
            employee_code: field(columns::EMPLOYEE_CODE),
            dept_code: field(columns::DEPT_CODE),
            dept_name: field(columns::DEPT_NAME),
            office_phone: field(columns::OFFICE_PHONE),
            mobile_phone: field(columns::MOBILE_PHONE),
        })
    }
}

/// An operator allowed to register VOCs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMember {
    pub member_id: String,
    pub auth: String,
}

impl AuthMember {
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let member_id = record.get(columns::MEMBER_ID)?.trim().to_string();
        if member_id.is_empty() {
            return None;
        }
        Some(Self {
            member_id,
            auth: record.get(columns::AUTH).map(|a| a.trim().to_string()).unwrap_or_default(),
        })
    }
}

/// Name index over the personnel directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    by_name: HashMap<String, DirectoryEntry>,
    ambiguous: BTreeSet<String>,
    skipped: usize,
}

impl DirectoryIndex {
    /// Index raw records by name. Records without a name are skipped.
    pub fn build(records: &[RawRecord]) -> Self {
        let mut index = Self::default();

        for record in records {
            match DirectoryEntry::from_record(record) {
                Some(entry) => index.insert(entry),
                None => index.skipped += 1,
            }
        }

        index
    }

    /// Index already typed entries.
    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    fn insert(&mut self, entry: DirectoryEntry) {
        if self.by_name.contains_key(&entry.name) {
            self.ambiguous.insert(entry.name);
            return;
        }
        self.by_name.insert(entry.name.clone(), entry);
    }

    /// Presence check used by validation.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.by_name.get(name)
    }

    /// Names shared by more than one record.
    pub fn ambiguous_names(&self) -> &BTreeSet<String> {
        &self.ambiguous
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.contains(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Records dropped for lacking a name.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Log a summary: size, a few sample names and any ambiguous names.
    pub fn log_summary(&self) {
        let mut sample: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        sample.sort_unstable();
        let more = if sample.len() > 5 { ", ..." } else { "" };
        sample.truncate(5);

        log_info(format!(
            "Directory loaded: {} names ({}{}), {} records without a name",
            self.len(),
            sample.join(", "),
            more,
            self.skipped
        ));

        if !self.ambiguous.is_empty() {
            let names: Vec<&str> = self.ambiguous.iter().map(String::as_str).collect();
            log_warning(format!(
                "{} names appear more than once in the directory, first record wins: {}",
                names.len(),
                names.join(", ")
            ));
        }
    }
}

/// Look up `login_id` among the authorized members.
pub fn find_operator<'a>(login_id: &str, members: &'a [AuthMember]) -> Option<&'a AuthMember> {
    members.iter().find(|m| m.member_id == login_id)
}
