//! Core types for walbench

use crate::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key, must be non-negative
    pub key: i64,
    /// Payload, must be non-empty
    pub value: String,
}

impl Record {
    /// Create a new record
    pub fn new(key: i64, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Reject records the engine must never see
    pub fn validate(&self) -> Result<()> {
        if self.key < 0 {
            return Err(BenchError::BadRecord {
                key: self.key,
                reason: "negative key",
            });
        }
        if self.value.is_empty() {
            return Err(BenchError::BadRecord {
                key: self.key,
                reason: "empty value",
            });
        }
        Ok(())
    }
}

/// SQLite journal mode under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// Rollback journal, deleted at the end of each transaction
    #[default]
    Delete,
    /// Write-ahead log
    Wal,
}

impl DurabilityMode {
    /// Value for `PRAGMA journal_mode = ...`
    pub fn pragma_value(self) -> &'static str {
        match self {
            DurabilityMode::Delete => "DELETE",
            DurabilityMode::Wal => "WAL",
        }
    }

    /// Parse a mode name, case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("delete") {
            Some(DurabilityMode::Delete)
        } else if name.eq_ignore_ascii_case("wal") {
            Some(DurabilityMode::Wal)
        } else {
            None
        }
    }

    /// Map an engine response; anything unrecognized counts as DELETE
    pub fn from_engine(response: Option<&str>) -> Self {
        response.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pragma_value())
    }
}

impl FromStr for DurabilityMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| BenchError::Config(format!("unknown journal mode: {}", s)))
    }
}

/// Engine setting applied out-of-band, e.g. `busy_timeout = 5000`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pragma {
    pub setting: String,
    pub value: String,
}

impl Pragma {
    /// Create a new pragma
    pub fn new(setting: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            value: value.into(),
        }
    }

    /// Check that the pair can be spliced into a `PRAGMA` statement
    pub fn validate(&self) -> Result<()> {
        Self::validate_setting(&self.setting)?;
        if !value_is_literal(&self.value) {
            return Err(BenchError::Config(format!(
                "invalid value for pragma {}: {:?}",
                self.setting, self.value
            )));
        }
        Ok(())
    }

    /// Check that `setting` is a bare identifier
    pub fn validate_setting(setting: &str) -> Result<()> {
        let mut chars = setting.chars();
        let ident = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !ident {
            return Err(BenchError::Config(format!(
                "invalid pragma setting: {:?}",
                setting
            )));
        }
        Ok(())
    }

    /// True for `journal_mode`, which the mode controller owns
    pub fn is_journal_mode(&self) -> bool {
        self.setting.eq_ignore_ascii_case("journal_mode")
    }
}

/// A bare word or number, or a single-quoted string with `''` escapes
fn value_is_literal(value: &str) -> bool {
    if let Some(inner) = value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return !inner.contains('\0') && !inner.replace("''", "").contains('\'');
    }
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
}

impl fmt::Display for Pragma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.setting, self.value)
    }
}

impl FromStr for Pragma {
    type Err = BenchError;

    /// Parse `setting=value`
    fn from_str(s: &str) -> Result<Self> {
        let (setting, value) = s
            .split_once('=')
            .ok_or_else(|| BenchError::Config(format!("expected setting=value, got {:?}", s)))?;
        let pragma = Pragma::new(setting.trim(), value.trim());
        pragma.validate()?;
        Ok(pragma)
    }
}
