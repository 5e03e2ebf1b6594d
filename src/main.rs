use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use councillor_import::{
    count_rows, run_import, setup_database, HttpSource, ScrapeConfig, MEMBERSHIPS_TABLE,
    TERMS_TABLE, VERSION,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🏛️  Councillor Import v{} - ws.parlament.ch → SQLite", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = ScrapeConfig::default();

    // 1. Setup database
    println!("\n🔧 Setting up database...");
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    setup_database(&conn).context("Failed to initialize schema")?;
    println!("✓ Database ready at {}", config.database_path.display());

    // 2. Import
    println!("\n📥 Importing terms and memberships...");
    let source = HttpSource::new().context("Failed to build HTTP client")?;
    let today = Local::now().date_naive();
    let stats = run_import(&source, &conn, &config, today).context("Import aborted")?;

    println!("✓ Terms stored: {}", stats.terms_stored);
    println!("✓ Historic terms scraped: {}", stats.historic_terms);
    println!("✓ Current terms scraped: {}", stats.current_terms);
    println!("✓ Terms not started yet: {}", stats.skipped_terms);
    println!("✓ Memberships stored: {}", stats.memberships_stored);

    // 3. Verify
    println!("\n🔍 Verifying database...");
    let terms = count_rows(&conn, TERMS_TABLE)?;
    let memberships = count_rows(&conn, MEMBERSHIPS_TABLE)?;
    println!("✓ Database contains {} terms, {} memberships", terms, memberships);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");

    Ok(())
}
