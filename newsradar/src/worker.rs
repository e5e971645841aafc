use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::aggregator::{NewsAggregator, NewsQuery};
use crate::trends::TrendTracker;

/// Refresh the headlines of every country once and feed the trend tracker.
/// Returns the number of articles newly counted by the tracker.
pub async fn refresh_countries(
    aggregator: &NewsAggregator,
    trends: &TrendTracker,
    countries: &[String],
) -> usize {
    let mut counted = 0;
    for country in countries {
        let articles = aggregator.refresh(&NewsQuery::headlines(country.clone())).await;
        if articles.is_empty() {
            warn!(country = %country, "worker: refresh returned no articles");
        }
        counted += trends.record(&articles);
    }
    counted
}

/// Background refresh loop. Runs until `shutdown_notify` is signalled.
pub async fn run_worker(
    aggregator: Arc<NewsAggregator>,
    trends: Arc<TrendTracker>,
    countries: Vec<String>,
    interval: Duration,
    shutdown_notify: Arc<Notify>,
) -> anyhow::Result<()> {
    info!(countries = ?countries, interval_secs = interval.as_secs(), "worker: starting");
    if countries.is_empty() {
        info!("worker: no countries configured, waiting for shutdown");
        shutdown_notify.notified().await;
        return Ok(());
    }

    loop {
        let counted = refresh_countries(&aggregator, &trends, &countries).await;
        info!(new_articles = counted, "worker: refresh complete");

        select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown_notify.notified() => {
                info!("worker: shutdown requested, exiting loop");
                break;
            }
        }
    }

    info!("worker: cleanup complete");
    Ok(())
}
