// 💾 Persistence Sink - SQLite
// Upsert on natural keys: re-importing unchanged data leaves the tables unchanged

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use crate::error::Result;
use crate::records::{Gender, MembershipRecord, UpstreamId};
use crate::terms::Term;

pub const TERMS_TABLE: &str = "terms";
pub const MEMBERSHIPS_TABLE: &str = "memberships";

// ============================================================================
// ROW TRAIT
// ============================================================================

/// Row - a record that knows its table and natural key
pub trait Row {
    const TABLE: &'static str;
    const KEY: &'static [&'static str];

    /// `(column, value)` pairs in insertion order. Must include every key column.
    fn columns(&self) -> Vec<(&'static str, SqlValue)>;
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

fn opt_text<T: ToString>(value: Option<T>) -> SqlValue {
    match value {
        Some(v) => SqlValue::Text(v.to_string()),
        None => SqlValue::Null,
    }
}

impl Row for Term {
    const TABLE: &'static str = TERMS_TABLE;
    const KEY: &'static [&'static str] = &["id"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("id", SqlValue::Integer(self.id)),
            ("start_date", SqlValue::Text(self.start_date.to_string())),
            ("end_date", SqlValue::Text(self.end_date.to_string())),
        ]
    }
}

impl Row for MembershipRecord {
    const TABLE: &'static str = MEMBERSHIPS_TABLE;
    const KEY: &'static [&'static str] = &["id", "term"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("id", SqlValue::Integer(self.id)),
            ("term", SqlValue::Integer(self.term)),
            ("identifier_upstream", SqlValue::Integer(self.identifier_upstream)),
            ("name", text(&self.name)),
            ("sort_name", text(&self.sort_name)),
            ("given_name", text(&self.given_name)),
            ("family_name", text(&self.family_name)),
            ("birth_date", opt_text(self.birth_date)),
            ("gender", opt_text(self.gender.map(|g| g.as_str()))),
            ("area", text(&self.area)),
            ("area_id", opt_text(self.area_id.as_ref())),
            ("council", text(&self.council)),
            ("council_id", opt_text(self.council_id.as_ref())),
            ("party", text(&self.party)),
            ("party_id", opt_text(self.party_id.as_ref())),
            ("faction", text(&self.faction)),
            ("faction_id", opt_text(self.faction_id.as_ref())),
            ("start_date", opt_text(self.start_date)),
            ("end_date", opt_text(self.end_date)),
            ("source", opt_text(self.source.as_deref())),
            ("image", opt_text(self.image.as_deref())),
        ]
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS terms (
            id INTEGER PRIMARY KEY,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS memberships (
            id INTEGER NOT NULL,
            term INTEGER NOT NULL REFERENCES terms(id),
            identifier_upstream INTEGER NOT NULL,
            name TEXT NOT NULL,
            sort_name TEXT NOT NULL,
            given_name TEXT NOT NULL,
            family_name TEXT NOT NULL,
            birth_date TEXT,
            gender TEXT,
            area TEXT NOT NULL,
            area_id TEXT,
            council TEXT NOT NULL,
            council_id TEXT,
            party TEXT NOT NULL,
            party_id TEXT,
            faction TEXT NOT NULL,
            faction_id TEXT,
            start_date TEXT,
            end_date TEXT,
            source TEXT,
            image TEXT,
            PRIMARY KEY (id, term)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_memberships_term ON memberships(term)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// UPSERT
// ============================================================================

/// Insert-or-update `columns` into `table`, keyed on `key_fields`.
///
/// Non-key columns are overwritten on conflict; last write wins.
pub fn upsert_row(
    conn: &Connection,
    table: &str,
    key_fields: &[&str],
    columns: Vec<(&str, SqlValue)>,
) -> Result<()> {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = names
        .iter()
        .filter(|name| !key_fields.contains(name))
        .map(|name| format!("{0} = excluded.{0}", name))
        .collect();

    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        table,
        names.join(", "),
        placeholders.join(", "),
        key_fields.join(", "),
        on_conflict,
    );

    conn.execute(&sql, params_from_iter(columns.into_iter().map(|(_, v)| v)))?;
    Ok(())
}

pub fn upsert<R: Row>(conn: &Connection, row: &R) -> Result<()> {
    upsert_row(conn, R::TABLE, R::KEY, row.columns())
}

// ============================================================================
// READS
// ============================================================================

pub fn get_terms(conn: &Connection) -> Result<Vec<Term>> {
    let mut stmt = conn.prepare("SELECT id, start_date, end_date FROM terms ORDER BY id")?;

    let terms = stmt
        .query_map([], |row| {
            Ok(Term {
                id: row.get(0)?,
                start_date: row.get(1)?,
                end_date: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(terms)
}

fn stored_gender(value: Option<String>) -> Option<Gender> {
    match value.as_deref() {
        Some("male") => Some(Gender::Male),
        Some("female") => Some(Gender::Female),
        _ => None,
    }
}

pub fn get_memberships(conn: &Connection) -> Result<Vec<MembershipRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, term, identifier_upstream, name, sort_name, given_name, family_name,
                birth_date, gender, area, area_id, council, council_id, party, party_id,
                faction, faction_id, start_date, end_date, source, image
         FROM memberships
         ORDER BY term, id",
    )?;

    let memberships = stmt
        .query_map([], |row| {
            let id_at = |idx: usize| -> rusqlite::Result<Option<UpstreamId>> {
                Ok(row.get::<_, Option<String>>(idx)?.map(UpstreamId::new))
            };

            Ok(MembershipRecord {
                id: row.get(0)?,
                term: row.get(1)?,
                identifier_upstream: row.get(2)?,
                name: row.get(3)?,
                sort_name: row.get(4)?,
                given_name: row.get(5)?,
                family_name: row.get(6)?,
                birth_date: row.get(7)?,
                gender: stored_gender(row.get(8)?),
                area: row.get(9)?,
                area_id: id_at(10)?,
                council: row.get(11)?,
                council_id: id_at(12)?,
                party: row.get(13)?,
                party_id: id_at(14)?,
                faction: row.get(15)?,
                faction_id: id_at(16)?,
                start_date: row.get(17)?,
                end_date: row.get(18)?,
                source: row.get(19)?,
                image: row.get(20)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(memberships)
}

/// Row count for one of the two known tables
pub fn count_rows(conn: &Connection, table: &'static str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn create_test_membership(id: i64, term: i64, party: &str) -> MembershipRecord {
        MembershipRecord {
            id,
            term,
            identifier_upstream: id + 1000,
            name: "Jean Dupont".to_string(),
            sort_name: "Dupont, Jean".to_string(),
            given_name: "Jean".to_string(),
            family_name: "Dupont".to_string(),
            birth_date: Some(date("1961-04-13")),
            gender: Some(Gender::Male),
            area: "GE".to_string(),
            area_id: Some(UpstreamId::new("25")),
            council: "NR".to_string(),
            council_id: Some(UpstreamId::new("1")),
            party: party.to_string(),
            party_id: None,
            faction: "RL".to_string(),
            faction_id: Some(UpstreamId::new("4")),
            start_date: Some(date("2013-03-01")),
            end_date: None,
            source: Some("http://bio/1".to_string()),
            image: None,
        }
    }

    #[test]
    fn test_term_upsert_is_idempotent() {
        let conn = test_db();
        let term = Term::new(49, date("2011-12-05"), date("2015-12-01")).unwrap();

        upsert(&conn, &term).unwrap();
        upsert(&conn, &term).unwrap();

        assert_eq!(count_rows(&conn, TERMS_TABLE).unwrap(), 1);
        assert_eq!(get_terms(&conn).unwrap(), vec![term]);
    }

    #[test]
    fn test_membership_round_trips_through_table() {
        let conn = test_db();
        upsert(&conn, &Term::new(49, date("2011-12-05"), date("2015-12-01")).unwrap()).unwrap();

        let record = create_test_membership(1108, 49, "PLR");
        upsert(&conn, &record).unwrap();

        let stored = get_memberships(&conn).unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn test_membership_key_is_id_and_term() {
        let conn = test_db();
        upsert(&conn, &Term::new(48, date("2007-12-03"), date("2011-12-04")).unwrap()).unwrap();
        upsert(&conn, &Term::new(49, date("2011-12-05"), date("2015-12-01")).unwrap()).unwrap();

        // Same person in two terms: two rows
        upsert(&conn, &create_test_membership(1108, 48, "PLR")).unwrap();
        upsert(&conn, &create_test_membership(1108, 49, "PLR")).unwrap();
        assert_eq!(count_rows(&conn, MEMBERSHIPS_TABLE).unwrap(), 2);

        // Same (id, term) again: overwritten, last write wins
        upsert(&conn, &create_test_membership(1108, 49, "FDP")).unwrap();
        assert_eq!(count_rows(&conn, MEMBERSHIPS_TABLE).unwrap(), 2);

        let stored = get_memberships(&conn).unwrap();
        assert_eq!(stored[1].term, 49);
        assert_eq!(stored[1].party, "FDP");
    }

    #[test]
    fn test_membership_requires_term_row() {
        let conn = test_db();
        let result = upsert(&conn, &create_test_membership(1, 99, "SP"));
        assert!(result.is_err(), "foreign key to terms should be enforced");
    }

    #[test]
    fn test_upsert_row_with_only_key_columns() {
        let conn = test_db();
        conn.execute("CREATE TABLE tags (name TEXT PRIMARY KEY)", []).unwrap();

        upsert_row(&conn, "tags", &["name"], vec![("name", text("a"))]).unwrap();
        upsert_row(&conn, "tags", &["name"], vec![("name", text("a"))]).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
