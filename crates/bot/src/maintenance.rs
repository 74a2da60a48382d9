//! Daily maintenance: the midnight sweep and the retention purge.
//!
//! Once per UTC midnight the sweep purges questions and attempts that
//! fell out of the retention window, then announces the fresh daily
//! test to every known user. The purge is also reachable from the CLI
//! (`maintenance` subcommand) for manual runs.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use prepmitra_core::storage::db;
use prepmitra_core::{config, get_connection, DbPool};

use crate::telegram::notifications;
use crate::telegram::Bot;

/// Purges rows older than the retention window.
///
/// With `dry_run` the rows are only counted, nothing is deleted.
pub fn run_purge(db_pool: &Arc<DbPool>, dry_run: bool) -> anyhow::Result<(usize, usize)> {
    let cutoff = Utc::now().date_naive() - ChronoDuration::days(config::maintenance::RETENTION_DAYS);
    let conn = get_connection(db_pool)?;

    if dry_run {
        let (questions, attempts) = db::count_expired(&conn, cutoff)?;
        log::info!(
            "Dry run: {} question(s) and {} attempt(s) older than {} would be purged",
            questions,
            attempts,
            cutoff
        );
        Ok((questions as usize, attempts as usize))
    } else {
        let (questions, attempts) = db::purge_expired(&conn, cutoff)?;
        log::info!(
            "Purged {} question(s) and {} attempt(s) older than {}",
            questions,
            attempts,
            cutoff
        );
        Ok((questions, attempts))
    }
}

/// How long until the next UTC midnight.
fn until_next_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let next_midnight = (now.date_naive() + ChronoDuration::days(1))
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);
    (next_midnight - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}

/// Spawns the midnight sweep loop: purge, then broadcast the new day.
pub fn spawn_daily_sweep(bot: Bot, db_pool: Arc<DbPool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_midnight(Utc::now());
            log::info!("Next maintenance sweep in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            let today = Utc::now().date_naive();
            log::info!("Running maintenance sweep for {}", today);

            if let Err(e) = run_purge(&db_pool, false) {
                // A failed purge only delays cleanup to the next sweep
                log::error!("Maintenance purge failed: {}", e);
            }

            notifications::notify_new_daily(&bot, &db_pool, today).await;
        }
    })
}
