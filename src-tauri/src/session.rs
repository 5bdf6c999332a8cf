//! One map session: the refetch policy, the bay catalogue and the feed,
//! wired so that a settle event decides synchronously and any fetch it
//! triggers runs in the background.

use crate::catalog::{ApplyOutcome, BayCatalog};
use crate::config::PolicyConfig;
use crate::database;
use crate::error::Result;
use crate::feed::StatusFeed;
use crate::freshness::{Clock, FreshnessPolicy, SystemClock};
use crate::types::{Decision, FetchTicket, StatusRefresh, Viewport};
use sqlx::sqlite::SqlitePool;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REFRESH_CHANNEL_CAPACITY: usize = 16;

pub struct MapSession<F: StatusFeed + 'static> {
    policy: Mutex<FreshnessPolicy>,
    catalog: Arc<RwLock<BayCatalog>>,
    feed: Arc<F>,
    clock: Box<dyn Clock>,
    refreshes: broadcast::Sender<StatusRefresh>,
}

impl<F: StatusFeed + 'static> MapSession<F> {
    pub fn new(config: PolicyConfig, feed: F, catalog: BayCatalog) -> Self {
        Self::with_clock(config, feed, catalog, Box::new(SystemClock))
    }

    pub fn with_clock(
        config: PolicyConfig,
        feed: F,
        catalog: BayCatalog,
        clock: Box<dyn Clock>,
    ) -> Self {
        let (refreshes, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            policy: Mutex::new(FreshnessPolicy::new(config)),
            catalog: Arc::new(RwLock::new(catalog)),
            feed: Arc::new(feed),
            clock,
            refreshes,
        }
    }

    pub fn catalog(&self) -> Arc<RwLock<BayCatalog>> {
        Arc::clone(&self.catalog)
    }

    /// Notified after every status batch that lands in the catalogue.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusRefresh> {
        self.refreshes.subscribe()
    }

    /// Snapshot of the last fetch decision, if any.
    pub fn last_fetch(&self) -> Option<FetchTicket> {
        let policy = match self.policy.lock() {
            Ok(policy) => policy,
            Err(poisoned) => poisoned.into_inner(),
        };
        policy.state().last_fetch().copied()
    }

    /// Decide for a settled viewport. A `Refetch` spawns the fetch and
    /// returns immediately; the policy's bookkeeping is already updated.
    pub fn viewport_settled(&self, viewport: &Viewport) -> Decision {
        self.settle(viewport).0
    }

    /// Like [`viewport_settled`](Self::viewport_settled), but hands back the
    /// spawned fetch so callers can await it.
    pub fn settle(&self, viewport: &Viewport) -> (Decision, Option<JoinHandle<()>>) {
        let now = self.clock.now();
        let decision = match self.policy.lock() {
            Ok(mut policy) => policy.on_viewport_settled(viewport, now),
            Err(poisoned) => poisoned.into_inner().on_viewport_settled(viewport, now),
        };

        match decision {
            Decision::Refetch { center, reason } => {
                info!(event = "session.refetch", ?reason, %center);
                let ticket = FetchTicket {
                    center,
                    issued_at: now,
                };
                (decision, Some(self.spawn_refresh(ticket)))
            }
            Decision::NoAction => (decision, None),
        }
    }

    fn spawn_refresh(&self, ticket: FetchTicket) -> JoinHandle<()> {
        let feed = Arc::clone(&self.feed);
        let catalog = Arc::clone(&self.catalog);
        let refreshes = self.refreshes.clone();
        tokio::spawn(async move {
            // Failures only get logged; the policy has already moved on.
            if let Err(e) = refresh(feed.as_ref(), &catalog, &refreshes, ticket).await {
                warn!(event = "session.refresh_failed", center = %ticket.center, error = %e);
            }
        })
    }
}

/// Fetch status around the ticket's center and fold it into the catalogue.
pub async fn refresh<F: StatusFeed>(
    feed: &F,
    catalog: &RwLock<BayCatalog>,
    refreshes: &broadcast::Sender<StatusRefresh>,
    ticket: FetchTicket,
) -> Result<Option<StatusRefresh>> {
    let updates = feed.fetch_status_around(ticket.center).await?;

    let outcome = match catalog.write() {
        Ok(mut catalog) => catalog.apply(ticket, &updates),
        Err(poisoned) => poisoned.into_inner().apply(ticket, &updates),
    };

    match outcome {
        ApplyOutcome::Applied(refresh) => {
            debug!(
                event = "session.status_applied",
                applied = refresh.applied,
                unknown = refresh.unknown
            );
            // No subscribers is fine.
            let _ = refreshes.send(refresh.clone());
            Ok(Some(refresh))
        }
        ApplyOutcome::Superseded => {
            debug!(event = "session.status_superseded", issued_at = %ticket.issued_at);
            Ok(None)
        }
    }
}

/// Stored catalogue, or the feed's if nothing is stored yet (then persisted).
/// An unreachable feed yields an empty catalogue so the session still starts.
pub async fn load_catalog<F: StatusFeed>(pool: &SqlitePool, feed: &F) -> Result<BayCatalog> {
    let stored = database::load_bays(pool).await?;
    if !stored.is_empty() {
        info!(event = "session.catalog_loaded", source = "database", count = stored.len());
        return Ok(BayCatalog::new(stored));
    }

    let fetched = match feed.fetch_bays().await {
        Ok(bays) => bays,
        Err(e) => {
            warn!(event = "session.catalog_fetch_failed", error = %e);
            return Ok(BayCatalog::default());
        }
    };
    database::save_bays(pool, &fetched).await?;
    info!(event = "session.catalog_loaded", source = "feed", count = fetched.len());
    Ok(BayCatalog::new(fetched))
}
