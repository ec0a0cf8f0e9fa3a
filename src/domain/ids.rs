//! Board Identifiers
//!
//! The backend emits task ids as UUID strings, occasionally as numbers, and
//! sometimes not at all (a create that succeeded without echoing the row).
//! The drag layer needs a non-empty string key for every card, so each task
//! carries both: a display key and the backend-native id it came from.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix of ids synthesized for tasks the server has not named yet
const TEMP_ID_PREFIX: &str = "temp";

/// Length of the random part of a synthesized id
const TEMP_SUFFIX_LEN: usize = 7;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier exactly as the backend sent it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    /// Empty or whitespace-only strings are treated as a missing id
    pub fn is_blank(&self) -> bool {
        match self {
            RawId::Number(_) => false,
            RawId::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        RawId::Text(s.to_string())
    }
}

impl From<i64> for RawId {
    fn from(n: i64) -> Self {
        RawId::Number(n)
    }
}

/// Column identifier (the drop-zone key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<RawId> for ColumnId {
    fn from(raw: RawId) -> Self {
        Self(raw.to_string())
    }
}

/// Task identity: the display key paired with the backend-native id.
///
/// `original` is `None` while the task waits for a server-assigned id; such
/// a task must never be addressed on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    display: String,
    original: Option<RawId>,
}

impl TaskId {
    /// Normalize whatever id form the backend produced.
    ///
    /// Present ids keep their string form unchanged. Missing or blank ids get
    /// a synthesized `temp-<millis>-<suffix>` display key and no original.
    pub fn normalize(raw: Option<RawId>) -> Self {
        match raw {
            Some(raw) if !raw.is_blank() => Self {
                display: raw.to_string(),
                original: Some(raw),
            },
            _ => Self {
                display: synthesize_temp_id(),
                original: None,
            },
        }
    }

    /// Display key, safe to use as a drag key
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Backend-native id, if the server has assigned one
    pub fn original(&self) -> Option<&RawId> {
        self.original.as_ref()
    }

    /// True while the id is a local placeholder
    pub fn is_pending(&self) -> bool {
        self.original.is_none()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Free-function form of [`TaskId::normalize`]
pub fn normalize(raw: Option<RawId>) -> TaskId {
    TaskId::normalize(raw)
}

fn synthesize_temp_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TEMP_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}-{}-{}",
        TEMP_ID_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}
