//! Fan-out delivery to subscribed chats with per-recipient failure isolation.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{CHAT_IDS, SetStore};

/// Outcome of one delivery attempt, classified by the transport itself.
///
/// The dispatcher never inspects transport error text; whatever structured
/// signal the transport has (API error variants, status codes) is mapped to
/// one of these two classes before it gets here.
#[derive(Debug)]
pub enum DeliveryError {
    /// The recipient is gone for good (kicked, chat deleted, blocked).
    /// The dispatcher prunes it from the recipient set.
    Unreachable(String),
    /// Anything else: network trouble, throttling, unknown. The recipient
    /// is kept and the next matching announcement is tried again.
    Transient(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(detail) => write!(f, "recipient unreachable: {detail}"),
            Self::Transient(detail) => write!(f, "transient delivery failure: {detail}"),
        }
    }
}

/// Message delivery seam. The production impl is the Telegram client;
/// tests substitute their own.
pub trait Transport: Send + Sync {
    fn deliver(
        &self,
        recipient: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Tally of one broadcast over the recipient set.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub transient: usize,
    /// Recipients removed for being permanently unreachable.
    pub pruned: Vec<String>,
}

/// Sends one message to every recipient, sequentially, pausing a fixed
/// delay between sends to stay under the transport's rate limits.
pub struct Dispatcher<T> {
    transport: Arc<T>,
    send_delay: Duration,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: Arc<T>, send_delay: Duration) -> Self {
        Self {
            transport,
            send_delay,
        }
    }

    /// Deliver `text` to every recipient in `recipients`.
    ///
    /// Failures never abort the loop. Unreachable recipients are removed
    /// from `recipients` and the shrunk set is persisted through `store`
    /// immediately, so a crash right after cannot resurrect a dead entry.
    /// The caller is expected to hold the store lock for the whole cycle.
    pub async fn broadcast(
        &self,
        store: &SetStore,
        recipients: &mut HashSet<String>,
        text: &str,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        // Snapshot so pruning mid-loop is safe.
        let snapshot: Vec<String> = recipients.iter().cloned().collect();
        for (i, recipient) in snapshot.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.send_delay).await;
            }
            report.attempted += 1;

            match self.transport.deliver(recipient, text).await {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Transient(detail)) => {
                    warn!("Delivery to {recipient} failed (keeping it): {detail}");
                    report.transient += 1;
                }
                Err(DeliveryError::Unreachable(detail)) => {
                    info!("Removing unreachable recipient {recipient}: {detail}");
                    recipients.remove(recipient);
                    if let Err(e) = store.save(CHAT_IDS, recipients) {
                        warn!("Failed to persist pruned recipient set: {e}");
                    }
                    report.pruned.push(recipient.clone());
                }
            }
        }

        report
    }
}
