// 🧭 Era Adapters - Record Normalization
// One normalizer per upstream response shape, one policy function to pick it

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{biography_url, EndpointTemplate, HistoricShape, ScrapeConfig};
use crate::error::{ImportError, Result};
use crate::records::{compose_names, parse_date, Gender, MembershipRecord, UpstreamId};
use crate::regions::RegionTable;
use crate::terms::Term;

// ============================================================================
// ERA STRATEGY
// ============================================================================

/// EraStrategy - which response shape a term's members arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraStrategy {
    /// Legacy historic endpoint: nested canton/council/party/faction objects
    NestedObjects,

    /// Current-members endpoint: flat strings, no ids, no clipping
    CurrentMembers,

    /// Revised historic endpoint: bare canton abbreviation + reference table
    CantonReference,
}

impl EraStrategy {
    pub fn name(&self) -> &str {
        match self {
            EraStrategy::NestedObjects => "historic (nested)",
            EraStrategy::CurrentMembers => "current members",
            EraStrategy::CantonReference => "historic (canton reference)",
        }
    }

    /// Only the revised historic shape needs the cantons table
    pub fn needs_regions(&self) -> bool {
        matches!(self, EraStrategy::CantonReference)
    }

    pub fn endpoint<'c>(&self, config: &'c ScrapeConfig) -> &'c EndpointTemplate {
        match self {
            EraStrategy::CurrentMembers => &config.current_members,
            EraStrategy::NestedObjects | EraStrategy::CantonReference => {
                &config.historic_members
            }
        }
    }

    /// Historic endpoints filter by term id, the current one is unfiltered
    pub fn term_filter(&self, term: &Term) -> Option<i64> {
        match self {
            EraStrategy::CurrentMembers => None,
            EraStrategy::NestedObjects | EraStrategy::CantonReference => Some(term.id),
        }
    }
}

/// What to do with one listed term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermPlan {
    Scrape(EraStrategy),
    /// Term has not started yet: store the term row, fetch no members
    NotStarted,
}

/// Pick the one term of this run that uses the current-members endpoint.
///
/// Among the started terms the policy accepts, the highest id wins, so a
/// threshold policy never routes two terms to the same flat listing.
pub fn select_current_term<'t>(
    terms: impl IntoIterator<Item = &'t Term>,
    config: &ScrapeConfig,
    today: NaiveDate,
) -> Option<i64> {
    terms
        .into_iter()
        .filter(|t| t.has_started(today) && config.current_term.is_current(t.id))
        .map(|t| t.id)
        .max()
}

/// The single era-selection policy.
///
/// Future terms are never scraped. The term picked by
/// [`select_current_term`] goes to the current-members endpoint. Every
/// other term goes to the historic endpoint in whichever shape is
/// configured.
pub fn plan_term(
    term: &Term,
    config: &ScrapeConfig,
    today: NaiveDate,
    current_term: Option<i64>,
) -> TermPlan {
    if !term.has_started(today) {
        return TermPlan::NotStarted;
    }
    if current_term == Some(term.id) {
        return TermPlan::Scrape(EraStrategy::CurrentMembers);
    }
    match config.historic_shape {
        HistoricShape::Nested => TermPlan::Scrape(EraStrategy::NestedObjects),
        HistoricShape::CantonReference => TermPlan::Scrape(EraStrategy::CantonReference),
    }
}

// ============================================================================
// NORMALIZER TRAIT
// ============================================================================

/// MemberNormalizer - raw upstream record → canonical MembershipRecord
///
/// Implementations never mutate the raw record. Any missing required
/// field, unknown gender or unknown canton is returned as an error.
pub trait MemberNormalizer {
    fn normalize(
        &self,
        raw: &Value,
        term: &Term,
        regions: &RegionTable,
    ) -> Result<MembershipRecord>;

    fn strategy(&self) -> EraStrategy;
}

/// Factory: one boxed normalizer per strategy
pub fn get_normalizer(
    strategy: EraStrategy,
    config: &ScrapeConfig,
) -> Box<dyn MemberNormalizer> {
    let biography_url = config.biography_url.clone();
    match strategy {
        EraStrategy::NestedObjects => Box::new(NestedNormalizer { biography_url }),
        EraStrategy::CurrentMembers => Box::new(CurrentNormalizer),
        EraStrategy::CantonReference => Box::new(CantonReferenceNormalizer { biography_url }),
    }
}

// ============================================================================
// RAW SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct NestedRef {
    #[serde(default)]
    id: Option<UpstreamId>,
    abbreviation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Membership {
    #[serde(default)]
    entry_date: Option<String>,
    #[serde(default)]
    leaving_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedMember {
    id: i64,
    #[serde(default)]
    number: Option<i64>,
    first_name: String,
    last_name: String,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    canton: NestedRef,
    council: NestedRef,
    party: NestedRef,
    faction: NestedRef,
    membership: Membership,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CantonCodeMember {
    id: i64,
    #[serde(default)]
    number: Option<i64>,
    first_name: String,
    last_name: String,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    canton_abbreviation: String,
    council: NestedRef,
    party: NestedRef,
    faction: NestedRef,
    membership: Membership,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentMember {
    id: i64,
    #[serde(default)]
    number: Option<i64>,
    first_name: String,
    last_name: String,
    canton: String,
    council: String,
    party: String,
    faction: String,
    #[serde(default)]
    picture_url: Option<String>,
    #[serde(default)]
    biography_url: Option<String>,
}

fn decode<T: DeserializeOwned>(raw: &Value) -> Result<T> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        let id = raw
            .get("id")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<no id>".to_string());
        ImportError::malformed(format!("member record {}", id), e)
    })
}

// ============================================================================
// SHARED SUB-ALGORITHMS
// ============================================================================

/// Entry date, kept only if the member joined after the term began
pub fn clip_entry(
    entry: Option<&str>,
    term: &Term,
    context: &str,
) -> Result<Option<NaiveDate>> {
    match entry {
        Some(raw) => {
            let date = parse_date(raw, context)?;
            Ok((date > term.start_date).then_some(date))
        }
        None => Ok(None),
    }
}

/// Leaving date, kept only if the member left before the term ended
pub fn clip_leaving(
    leaving: Option<&str>,
    term: &Term,
    context: &str,
) -> Result<Option<NaiveDate>> {
    match leaving {
        Some(raw) => {
            let date = parse_date(raw, context)?;
            Ok((date < term.end_date).then_some(date))
        }
        None => Ok(None),
    }
}

/// Fields every historic shape shares once the canton is known
struct HistoricParts<'a> {
    id: i64,
    number: Option<i64>,
    first_name: &'a str,
    last_name: &'a str,
    birth_date: Option<&'a str>,
    gender: Option<&'a str>,
    council: &'a NestedRef,
    party: &'a NestedRef,
    faction: &'a NestedRef,
    membership: &'a Membership,
}

fn build_historic(
    parts: HistoricParts<'_>,
    area: String,
    area_id: Option<UpstreamId>,
    term: &Term,
    biography_template: &str,
) -> Result<MembershipRecord> {
    let context = format!("member {}", parts.id);
    let (name, sort_name) = compose_names(parts.first_name, parts.last_name);

    let birth_date = parts
        .birth_date
        .map(|raw| parse_date(raw, &context))
        .transpose()?;

    Ok(MembershipRecord {
        id: parts.id,
        term: term.id,
        identifier_upstream: parts.number.unwrap_or(parts.id),
        name,
        sort_name,
        given_name: parts.first_name.to_string(),
        family_name: parts.last_name.to_string(),
        birth_date,
        gender: Gender::decode(parts.gender, parts.id)?,
        area,
        area_id,
        council: parts.council.abbreviation.clone(),
        council_id: parts.council.id.clone(),
        party: parts.party.abbreviation.clone(),
        party_id: parts.party.id.clone(),
        faction: parts.faction.abbreviation.clone(),
        faction_id: parts.faction.id.clone(),
        start_date: clip_entry(parts.membership.entry_date.as_deref(), term, &context)?,
        end_date: clip_leaving(parts.membership.leaving_date.as_deref(), term, &context)?,
        source: Some(biography_url(biography_template, parts.id)),
        image: None,
    })
}

// ============================================================================
// VARIANT A - NESTED OBJECTS
// ============================================================================

pub struct NestedNormalizer {
    biography_url: String,
}

impl MemberNormalizer for NestedNormalizer {
    fn normalize(
        &self,
        raw: &Value,
        term: &Term,
        _regions: &RegionTable,
    ) -> Result<MembershipRecord> {
        let mp: NestedMember = decode(raw)?;
        let parts = HistoricParts {
            id: mp.id,
            number: mp.number,
            first_name: &mp.first_name,
            last_name: &mp.last_name,
            birth_date: mp.birth_date.as_deref(),
            gender: mp.gender.as_deref(),
            council: &mp.council,
            party: &mp.party,
            faction: &mp.faction,
            membership: &mp.membership,
        };
        build_historic(
            parts,
            mp.canton.abbreviation.clone(),
            mp.canton.id.clone(),
            term,
            &self.biography_url,
        )
    }

    fn strategy(&self) -> EraStrategy {
        EraStrategy::NestedObjects
    }
}

// ============================================================================
// VARIANT B - CURRENT MEMBERS
// ============================================================================

pub struct CurrentNormalizer;

impl MemberNormalizer for CurrentNormalizer {
    fn normalize(
        &self,
        raw: &Value,
        term: &Term,
        _regions: &RegionTable,
    ) -> Result<MembershipRecord> {
        let mp: CurrentMember = decode(raw)?;
        let (name, sort_name) = compose_names(&mp.first_name, &mp.last_name);

        Ok(MembershipRecord {
            id: mp.id,
            term: term.id,
            identifier_upstream: mp.number.unwrap_or(mp.id),
            name,
            sort_name,
            given_name: mp.first_name,
            family_name: mp.last_name,
            birth_date: None,
            gender: None,
            area: mp.canton,
            area_id: None,
            council: mp.council,
            council_id: None,
            party: mp.party,
            party_id: None,
            faction: mp.faction,
            faction_id: None,
            start_date: None,
            end_date: None,
            source: mp.biography_url,
            image: mp.picture_url,
        })
    }

    fn strategy(&self) -> EraStrategy {
        EraStrategy::CurrentMembers
    }
}

// ============================================================================
// VARIANT C - CANTON REFERENCE
// ============================================================================

pub struct CantonReferenceNormalizer {
    biography_url: String,
}

impl MemberNormalizer for CantonReferenceNormalizer {
    fn normalize(
        &self,
        raw: &Value,
        term: &Term,
        regions: &RegionTable,
    ) -> Result<MembershipRecord> {
        let mp: CantonCodeMember = decode(raw)?;
        let region = regions.resolve(&mp.canton_abbreviation, mp.id)?;
        let parts = HistoricParts {
            id: mp.id,
            number: mp.number,
            first_name: &mp.first_name,
            last_name: &mp.last_name,
            birth_date: mp.birth_date.as_deref(),
            gender: mp.gender.as_deref(),
            council: &mp.council,
            party: &mp.party,
            faction: &mp.faction,
            membership: &mp.membership,
        };
        build_historic(
            parts,
            region.code.clone(),
            Some(region.upstream_id.clone()),
            term,
            &self.biography_url,
        )
    }

    fn strategy(&self) -> EraStrategy {
        EraStrategy::CantonReference
    }
}
