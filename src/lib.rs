// Councillor Import - Core Library
// Legislative terms + councillor memberships: fetch, normalize per era, upsert into SQLite

pub mod config;
pub mod db;
pub mod era;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod records;
pub mod regions;
pub mod terms;

// Re-export commonly used types
pub use config::{CurrentTermPolicy, EndpointTemplate, HistoricShape, ScrapeConfig};
pub use db::{
    count_rows, get_memberships, get_terms, setup_database, upsert, upsert_row, Row,
    MEMBERSHIPS_TABLE, TERMS_TABLE,
};
pub use era::{
    get_normalizer, plan_term, select_current_term, EraStrategy, MemberNormalizer, TermPlan,
};
pub use error::{ImportError, Result};
pub use fetch::{fetch_pages, FixtureSource, HttpSource, JsonSource, MemberPages};
pub use pipeline::{import_term, run_import, ImportStats};
pub use records::{Gender, MembershipRecord, UpstreamId};
pub use regions::{load_regions, RegionReference, RegionTable};
pub use terms::{list_terms, Term};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
