// 📇 Canonical Records
// One stable output shape, whatever era the raw data came from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ImportError, Result};

// ============================================================================
// UPSTREAM ID
// ============================================================================

/// Opaque id assigned upstream. Sent as a number in some eras and a string
/// in others; stored as text either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct UpstreamId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl From<IdRepr> for UpstreamId {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Int(n) => UpstreamId(n.to_string()),
            IdRepr::Text(s) => UpstreamId(s),
        }
    }
}

impl From<UpstreamId> for String {
    fn from(id: UpstreamId) -> Self {
        id.0
    }
}

impl UpstreamId {
    pub fn new(id: impl Into<String>) -> Self {
        UpstreamId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Decode the single-character upstream code.
    ///
    /// `None` in, `None` out. Anything other than `m`/`f` is fatal.
    pub fn decode(code: Option<&str>, member_id: i64) -> Result<Option<Gender>> {
        match code {
            None => Ok(None),
            Some("m") => Ok(Some(Gender::Male)),
            Some("f") => Ok(Some(Gender::Female)),
            Some(other) => Err(ImportError::UnknownGender {
                member_id,
                code: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

// ============================================================================
// DATES
// ============================================================================

/// Keep only the date part of an upstream timestamp.
///
/// `"2011-12-05T00:00:00Z"` → `"2011-12-05"`. Strings shorter than ten
/// characters are returned whole.
pub fn truncate_date(raw: &str) -> &str {
    raw.get(..10).unwrap_or(raw)
}

/// Truncate then parse as an ISO date.
pub fn parse_date(raw: &str, context: &str) -> Result<NaiveDate> {
    let date = truncate_date(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| ImportError::malformed(context, format!("bad date {:?}: {}", raw, e)))
}

// ============================================================================
// MEMBERSHIP RECORD
// ============================================================================

/// One councillor's membership in one term. Natural key: `(id, term)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: i64,
    pub term: i64,
    pub identifier_upstream: i64,

    pub name: String,
    pub sort_name: String,
    pub given_name: String,
    pub family_name: String,

    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,

    pub area: String,
    pub area_id: Option<UpstreamId>,
    pub council: String,
    pub council_id: Option<UpstreamId>,
    pub party: String,
    pub party_id: Option<UpstreamId>,
    pub faction: String,
    pub faction_id: Option<UpstreamId>,

    /// Only set when the member entered after the term began
    pub start_date: Option<NaiveDate>,
    /// Only set when the member left before the term ended
    pub end_date: Option<NaiveDate>,

    pub source: Option<String>,
    pub image: Option<String>,
}

/// `(name, sort_name)` from given and family names
pub fn compose_names(given: &str, family: &str) -> (String, String) {
    (
        format!("{} {}", given, family),
        format!("{}, {}", family, given),
    )
}
