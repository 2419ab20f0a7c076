//! Background poll loop: fetch → filter → broadcast → commit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::broadcast::{Dispatcher, Transport};
use crate::filter::select_new;
use crate::render::render_alert;
use crate::source::{Announcement, BybitSource};
use crate::store::{CHAT_IDS, SENT_ANNOUNCEMENTS, SetStore};

/// Drives the fetch/filter/broadcast cycle on a fixed period.
///
/// Cycles never overlap: the next tick waits for the previous cycle,
/// dispatch included, to finish.
pub struct Poller<T> {
    source: BybitSource,
    dispatcher: Dispatcher<T>,
    store: Arc<Mutex<SetStore>>,
    keyword: String,
    interval: Duration,
    warmup: Duration,
}

impl<T: Transport> Poller<T> {
    pub fn new(
        source: BybitSource,
        dispatcher: Dispatcher<T>,
        store: Arc<Mutex<SetStore>>,
        keyword: String,
        interval: Duration,
        warmup: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            keyword,
            interval,
            warmup,
        }
    }

    /// Run forever. Failed cycles are logged and the loop keeps going.
    pub async fn run(self) {
        tokio::time::sleep(self.warmup).await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    async fn run_cycle(&self) {
        info!("Checking for new Bybit announcements...");
        let announcements = match self.source.fetch().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Fetch failed, skipping this cycle: {e}");
                return;
            }
        };
        if announcements.is_empty() {
            return;
        }
        self.process_batch(&announcements).await;
    }

    /// Filter a fetched page and broadcast whatever is new, committing each
    /// announcement id only after its fan-out completes.
    ///
    /// Holds the store lock for the whole load-modify-save sequence so a
    /// concurrent `/start` registration cannot be lost.
    pub async fn process_batch(&self, announcements: &[Announcement]) {
        let store = self.store.lock().await;

        let mut recipients = store.load(CHAT_IDS);
        if recipients.is_empty() {
            // Nothing is committed either, so the announcements are
            // retried once somebody subscribes.
            warn!("No subscribed chats; leaving new announcements unsent");
            return;
        }

        let mut delivered = store.load(SENT_ANNOUNCEMENTS);
        let fresh = select_new(announcements, &delivered, &self.keyword);
        for announcement in &fresh {
            info!("New matching announcement: {}", announcement.title);

            let text = render_alert(announcement);
            let report = self
                .dispatcher
                .broadcast(&store, &mut recipients, &text)
                .await;
            info!(
                "Broadcast {} done: {}/{} delivered, {} transient, {} pruned",
                announcement.id,
                report.delivered,
                report.attempted,
                report.transient,
                report.pruned.len()
            );

            // Commit per announcement, not per batch: an interrupted cycle
            // resumes from the oldest unsent match.
            delivered.insert(announcement.id.clone());
            if let Err(e) = store.save(SENT_ANNOUNCEMENTS, &delivered) {
                warn!("Failed to persist delivered ids: {e}");
            }
        }
    }
}
