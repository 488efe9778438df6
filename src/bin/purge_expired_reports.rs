//! Deletes credit reports that expired more than a grace period ago.
//!
//! The grace period defaults to 90 days and can be set with `REPORT_PURGE_GRACE_DAYS`.
//! Inquiries that referenced a purged report keep their row with the report link cleared.

use credit_bureau_api::config::Config;
use credit_bureau_api::db::Database;
use credit_bureau_api::db_storage::CreditStorage;

const DEFAULT_GRACE_DAYS: i64 = 90;

fn grace_days() -> anyhow::Result<i64> {
    match std::env::var("REPORT_PURGE_GRACE_DAYS") {
        Ok(raw) => {
            let days: i64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("REPORT_PURGE_GRACE_DAYS must be a number"))?;
            if days < 0 {
                anyhow::bail!("REPORT_PURGE_GRACE_DAYS cannot be negative");
            }
            Ok(days)
        }
        Err(_) => Ok(DEFAULT_GRACE_DAYS),
    }
}

/// Main entry point for the purge job.
///
/// Connects to the database and removes every report whose `expires_at` is older than
/// now minus the grace period.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let cutoff = chrono::Utc::now() - chrono::Duration::days(grace_days()?);

    let db = Database::connect_only(&config.database_url).await?;
    tracing::info!("Connected to database. Purging reports expired before {}...", cutoff);

    let deleted = CreditStorage::new(db.pool.clone())
        .purge_expired_reports(cutoff)
        .await?;

    tracing::info!("Purge complete. Deleted {} expired credit reports.", deleted);

    Ok(())
}
