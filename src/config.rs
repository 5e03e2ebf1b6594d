// ⚙️ Build-time configuration
// The run is parameterless: every URL and era threshold lives here.

use std::path::PathBuf;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const BASE_URL: &str = "http://ws.parlament.ch";

pub const TERMS_PATH: &str = "/legislativeperiods?format=json";
pub const CANTONS_PATH: &str = "/cantons?format=json";
pub const HISTORIC_MEMBERS_PATH: &str =
    "/councillors/historic?legislativePeriodFromFilter={term}&format=json&pageNumber={page}";
pub const CURRENT_MEMBERS_PATH: &str = "/councillors?format=json&pageNumber={page}";

pub const BIOGRAPHY_URL: &str =
    "http://www.parlament.ch/d/suche/seiten/biografie.aspx?biografie_id={id}";

/// Id of the ongoing legislative period (the 50th legislature)
pub const CURRENT_TERM_ID: i64 = 50;

pub const DATABASE_PATH: &str = "data.sqlite";

pub const USER_AGENT: &str = concat!("councillor-import/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// POLICIES
// ============================================================================

/// How the "current" term is recognised among the listed terms.
///
/// Two rules were observed across eras. They agree on today's data but
/// not necessarily on future listings, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentTermPolicy {
    /// Exactly this id is current
    FixedId(i64),

    /// Any id greater than the last historic id is current
    AfterLastHistoric(i64),
}

impl CurrentTermPolicy {
    pub fn is_current(&self, term_id: i64) -> bool {
        match self {
            CurrentTermPolicy::FixedId(id) => term_id == *id,
            CurrentTermPolicy::AfterLastHistoric(last) => term_id > *last,
        }
    }
}

/// Which record layout the historic endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricShape {
    /// canton/council/party/faction as nested objects
    Nested,

    /// canton as a bare abbreviation, resolved through the cantons table
    CantonReference,
}

// ============================================================================
// ENDPOINT TEMPLATE
// ============================================================================

/// URL template with `{page}` and optional `{term}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        EndpointTemplate(template.into())
    }

    pub fn for_page(&self, term: Option<i64>, page: u32) -> String {
        let url = self.0.replace("{page}", &page.to_string());
        match term {
            Some(id) => url.replace("{term}", &id.to_string()),
            None => url,
        }
    }
}

// ============================================================================
// SCRAPE CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub terms_url: String,
    pub cantons_url: String,
    pub historic_members: EndpointTemplate,
    pub current_members: EndpointTemplate,
    pub biography_url: String,
    pub current_term: CurrentTermPolicy,
    pub historic_shape: HistoricShape,
    pub database_path: PathBuf,
}

impl ScrapeConfig {
    /// Same paths, different host (used by tests against fixtures)
    pub fn with_base_url(base: &str) -> Self {
        ScrapeConfig {
            terms_url: format!("{}{}", base, TERMS_PATH),
            cantons_url: format!("{}{}", base, CANTONS_PATH),
            historic_members: EndpointTemplate::new(format!("{}{}", base, HISTORIC_MEMBERS_PATH)),
            current_members: EndpointTemplate::new(format!("{}{}", base, CURRENT_MEMBERS_PATH)),
            biography_url: BIOGRAPHY_URL.to_string(),
            current_term: CurrentTermPolicy::FixedId(CURRENT_TERM_ID),
            historic_shape: HistoricShape::Nested,
            database_path: PathBuf::from(DATABASE_PATH),
        }
    }
}

/// Fill a biography URL template with a member id
pub fn biography_url(template: &str, member_id: i64) -> String {
    template.replace("{id}", &member_id.to_string())
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig::with_base_url(BASE_URL)
    }
}
