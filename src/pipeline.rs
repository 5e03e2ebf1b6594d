// 🔁 Import Pipeline
// terms → plan → pages → normalize → upsert, strictly in fetch order

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::db::upsert;
use crate::era::{get_normalizer, plan_term, select_current_term, EraStrategy, TermPlan};
use crate::error::Result;
use crate::fetch::{fetch_array, fetch_pages, JsonSource};
use crate::regions::{load_regions, RegionTable};
use crate::terms::Term;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub terms_stored: usize,
    pub historic_terms: usize,
    pub current_terms: usize,
    pub skipped_terms: usize,
    pub memberships_stored: usize,
}

/// Runs one full import.
///
/// Terms are normalized and written one at a time, each before its members
/// are fetched. A malformed listing entry or a failure mid-term still leaves
/// every earlier term persisted. The first error ends the run.
pub fn run_import<S: JsonSource + ?Sized>(
    source: &S,
    conn: &Connection,
    config: &ScrapeConfig,
    today: NaiveDate,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let mut regions: Option<RegionTable> = None;

    let raw_terms = fetch_array(source, &config.terms_url)?;
    info!(terms = raw_terms.len(), "listed legislative periods");

    // Malformed entries are left out here; the loop below fails on them in order
    let well_formed: Vec<Term> = raw_terms
        .iter()
        .filter_map(|raw| Term::from_json(raw).ok())
        .collect();
    let current_term = select_current_term(&well_formed, config, today);

    for raw in &raw_terms {
        let term = &Term::from_json(raw)?;
        upsert(conn, term)?;
        stats.terms_stored += 1;

        let strategy = match plan_term(term, config, today, current_term) {
            TermPlan::Scrape(strategy) => strategy,
            TermPlan::NotStarted => {
                warn!(
                    term = term.id,
                    start = %term.start_date,
                    "term has not started, skipping members"
                );
                stats.skipped_terms += 1;
                continue;
            }
        };

        if strategy.needs_regions() && regions.is_none() {
            regions = Some(load_regions(source, &config.cantons_url)?);
        }
        let empty = RegionTable::default();
        let table = regions.as_ref().unwrap_or(&empty);

        let stored = import_term(source, conn, config, term, strategy, table)?;
        info!(term = term.id, era = strategy.name(), memberships = stored, "term imported");

        match strategy {
            EraStrategy::CurrentMembers => stats.current_terms += 1,
            EraStrategy::NestedObjects | EraStrategy::CantonReference => stats.historic_terms += 1,
        }
        stats.memberships_stored += stored;
    }

    Ok(stats)
}

/// Fetch, normalize and store every member of one term
pub fn import_term<S: JsonSource + ?Sized>(
    source: &S,
    conn: &Connection,
    config: &ScrapeConfig,
    term: &Term,
    strategy: EraStrategy,
    regions: &RegionTable,
) -> Result<usize> {
    let normalizer = get_normalizer(strategy, config);
    let pages = fetch_pages(source, strategy.endpoint(config), strategy.term_filter(term));

    let mut stored = 0;
    for raw in pages {
        let record = normalizer.normalize(&raw?, term, regions)?;
        upsert(conn, &record)?;
        stored += 1;
    }
    Ok(stored)
}
