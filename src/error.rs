// 🚨 Import Errors
// Every failure aborts the run. There is no per-record recovery.

use thiserror::Error;

/// All failure modes of an import run.
///
/// Each variant carries enough context (URL, member id, code) to tell
/// which record or endpoint stopped the run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Network or HTTP status failure while fetching an endpoint
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Body could not be parsed, or did not have the expected structure
    #[error("malformed response from {context}: {message}")]
    MalformedResponse { context: String, message: String },

    /// Gender code outside {m, f}
    #[error("unknown gender code {code:?} for member {member_id}")]
    UnknownGender { member_id: i64, code: String },

    /// Canton abbreviation missing from the reference table
    #[error("unresolved region code {code:?} for member {member_id}")]
    UnresolvedRegion { member_id: i64, code: String },

    /// Page had no records to read the continuation flag from
    #[error("empty page at {url}: no continuation flag to read")]
    PaginationProtocol { url: String },

    /// SQLite failure in the persistence sink
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ImportError {
    pub fn transport(url: &str, message: impl ToString) -> Self {
        ImportError::Transport {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn malformed(context: impl ToString, message: impl ToString) -> Self {
        ImportError::MalformedResponse {
            context: context.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
