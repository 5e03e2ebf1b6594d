// 🗺️ Canton Reference Table
// Loaded once per run, read-only afterwards, passed by reference.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{ImportError, Result};
use crate::fetch::{fetch_array, JsonSource};
use crate::records::UpstreamId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionReference {
    pub code: String,
    pub name: String,
    pub upstream_id: UpstreamId,
}

/// Upstream canton entry. Only the fields we keep.
#[derive(Debug, Deserialize)]
struct RawCanton {
    id: UpstreamId,
    abbreviation: String,
    name: String,
}

/// Immutable mapping `code -> RegionReference`.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    by_code: HashMap<String, RegionReference>,
}

impl RegionTable {
    pub fn from_references(refs: impl IntoIterator<Item = RegionReference>) -> Self {
        let by_code = refs.into_iter().map(|r| (r.code.clone(), r)).collect();
        RegionTable { by_code }
    }

    /// Build from the raw cantons listing
    pub fn from_json(entries: &[Value], context: &str) -> Result<Self> {
        let refs = entries
            .iter()
            .map(|entry| {
                let raw: RawCanton = serde_json::from_value(entry.clone())
                    .map_err(|e| ImportError::malformed(context, e))?;
                Ok(RegionReference {
                    code: raw.abbreviation,
                    name: raw.name,
                    upstream_id: raw.id,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RegionTable::from_references(refs))
    }

    pub fn get(&self, code: &str) -> Option<&RegionReference> {
        self.by_code.get(code)
    }

    /// Lookup that fails the run on an unknown code
    pub fn resolve(&self, code: &str, member_id: i64) -> Result<&RegionReference> {
        let region = self.get(code).ok_or_else(|| ImportError::UnresolvedRegion {
            member_id,
            code: code.to_string(),
        })?;
        debug!(member_id, code, name = %region.name, "resolved canton");
        Ok(region)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Fetch the cantons endpoint and build the table.
pub fn load_regions<S: JsonSource + ?Sized>(source: &S, url: &str) -> Result<RegionTable> {
    let entries = fetch_array(source, url)?;
    let table = RegionTable::from_json(&entries, url)?;
    info!(regions = table.len(), "loaded canton reference table");
    Ok(table)
}
