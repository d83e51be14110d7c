//! Sources of `ScrapeLogObserved` events.
//!
//! - [`ScrapeLogListener`] follows the insert notifications fired by the
//!   `scrape_logs` trigger and reconnects with backoff when the connection
//!   drops.
//! - [`ScrapeLogPoller`] periodically reads logs past its watermark. It is
//!   the only source while the listener is down and a safety net otherwise.

use super::change_detector::DetectorError;
use crate::entities::scrape_logs::ScrapeLogCursor;
use crate::events::{ObservationSource, ScrapeLogObserved, ScrapeLogObservedSender};
use crate::store::ScrapeLogStore;
use crate::utils::backoff::reconnect_delay;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Postgres NOTIFY channel the `scrape_logs` insert trigger fires on. The
/// name is fixed by the migration.
pub const SCRAPE_LOG_NOTIFY_CHANNEL: &str = "scrape_log_inserted";

enum ListenEnd {
    Shutdown,
    Dropped(sqlx::Error),
    ChannelClosed,
}

pub struct ScrapeLogListener {
    pool: PgPool,
    channel: &'static str,
    observed_tx: ScrapeLogObservedSender,
}

impl ScrapeLogListener {
    pub fn new(pool: PgPool, observed_tx: ScrapeLogObservedSender) -> Self {
        Self {
            pool,
            channel: SCRAPE_LOG_NOTIFY_CHANNEL,
            observed_tx,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(channel = %self.channel, "ScrapeLogListener started");
        let mut attempt = 0;

        loop {
            match self.connect().await {
                Ok(listener) => {
                    attempt = 0;
                    info!(channel = %self.channel, "Listening for scrape log inserts");
                    match self.listen(listener, &mut shutdown_rx).await {
                        ListenEnd::Shutdown | ListenEnd::ChannelClosed => break,
                        ListenEnd::Dropped(e) => {
                            warn!(error = %e, "Scrape log subscription dropped, poller covers until reconnect");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Failed to subscribe to scrape log inserts");
                }
            }

            let delay = reconnect_delay(attempt);
            attempt += 1;
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("ScrapeLogListener shutdown complete");
    }

    async fn connect(&self) -> Result<PgListener, DetectorError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(self.channel).await?;
        Ok(listener)
    }

    async fn listen(
        &self,
        mut listener: PgListener,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> ListenEnd {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ScrapeLogListener received shutdown signal");
                        return ListenEnd::Shutdown;
                    }
                }

                notification = listener.recv() => {
                    let notification = match notification {
                        Ok(notification) => notification,
                        Err(e) => return ListenEnd::Dropped(e),
                    };
                    let Ok(scrape_log_id) = notification.payload().trim().parse::<i64>() else {
                        warn!(payload = notification.payload(), "Ignoring malformed scrape log notification");
                        continue;
                    };
                    let observed = ScrapeLogObserved {
                        scrape_log_id,
                        source: ObservationSource::Live,
                    };
                    if self.observed_tx.send(observed).await.is_err() {
                        warn!("ScrapeLogObserved receiver dropped");
                        return ListenEnd::ChannelClosed;
                    }
                }
            }
        }
    }
}

pub struct ScrapeLogPoller<S> {
    store: Arc<S>,
    observed_tx: ScrapeLogObservedSender,
    every: Duration,
    batch: i64,
    /// Last log handed over. Only logs strictly past it are read.
    watermark: ScrapeLogCursor,
}

impl<S: ScrapeLogStore> ScrapeLogPoller<S> {
    pub fn new(
        store: Arc<S>,
        observed_tx: ScrapeLogObservedSender,
        every: Duration,
        batch: i64,
        start: OffsetDateTime,
    ) -> Self {
        Self {
            store,
            observed_tx,
            every,
            batch: batch.max(1),
            watermark: ScrapeLogCursor::after_time(start),
        }
    }

    pub fn watermark(&self) -> ScrapeLogCursor {
        self.watermark
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(watermark = %self.watermark.scraped_at, "ScrapeLogPoller started");
        let mut ticker = tokio::time::interval(self.every);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ScrapeLogPoller received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(found) => debug!(
                            found,
                            watermark = %self.watermark.scraped_at,
                            watermark_id = self.watermark.id,
                            "Polled scrape logs"
                        ),
                        Err(e) => error!(error = %e, "Failed to poll scrape logs"),
                    }
                    if self.observed_tx.is_closed() {
                        warn!("ScrapeLogObserved receiver dropped");
                        break;
                    }
                }
            }
        }

        info!("ScrapeLogPoller shutdown complete");
    }

    /// Hand over every log newer than the watermark and advance it.
    pub async fn poll_once(&mut self) -> Result<usize, DetectorError> {
        let mut found = 0;
        loop {
            let logs = self
                .store
                .scrape_logs_after(self.watermark, self.batch)
                .await?;
            let page = logs.len();

            for log in logs {
                let observed = ScrapeLogObserved {
                    scrape_log_id: log.id,
                    source: ObservationSource::Poll,
                };
                if self.observed_tx.send(observed).await.is_err() {
                    return Ok(found);
                }
                self.watermark = self.watermark.max(log.cursor());
                found += 1;
            }

            if (page as i64) < self.batch {
                return Ok(found);
            }
        }
    }
}
