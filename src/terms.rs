// 🏛️ Legislative Terms
// Listing + normalization of the `legislativeperiods` endpoint

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ImportError, Result};
use crate::fetch::{fetch_array, JsonSource};
use crate::records::parse_date;

/// Canonical legislative term. Invariant: `start_date <= end_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Upstream shape. `hasMorePages`, `updated` and `code` are dropped by
/// not being listed here.
#[derive(Debug, Deserialize)]
struct RawTerm {
    id: i64,
    from: String,
    to: String,
}

impl Term {
    pub fn new(id: i64, start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if start_date > end_date {
            return Err(ImportError::malformed(
                format!("term {}", id),
                format!("start {} is after end {}", start_date, end_date),
            ));
        }
        Ok(Term {
            id,
            start_date,
            end_date,
        })
    }

    /// `from`/`to` become `start_date`/`end_date`, truncated to the date part
    pub fn from_json(raw: &Value) -> Result<Self> {
        let raw: RawTerm = serde_json::from_value(raw.clone())
            .map_err(|e| ImportError::malformed("legislative period", e))?;
        let context = format!("term {}", raw.id);
        let start_date = parse_date(&raw.from, &context)?;
        let end_date = parse_date(&raw.to, &context)?;
        Term::new(raw.id, start_date, end_date)
    }

    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.start_date <= today
    }
}

/// Fetch all terms, in upstream order (not necessarily chronological).
pub fn list_terms<S: JsonSource + ?Sized>(source: &S, url: &str) -> Result<Vec<Term>> {
    fetch_array(source, url)?.iter().map(Term::from_json).collect()
}
