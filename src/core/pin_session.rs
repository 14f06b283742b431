//! Short-lived, view-once, use-once confirmation codes
//!
//! A PIN session binds a six-digit code to a session identifier. The code
//! has to be viewed before it can be verified, and a successful verification
//! consumes it. Every code expires a fixed time after generation.
//!
//! ```text
//! CREATED --view--> VIEWED --verify--> USED
//!    \                 \                 \
//!     +-----------------+-----------------+--> EXPIRED (after TTL / grace)
//! ```
//!
//! # Concurrency
//!
//! Sessions live in a `DashMap`. View and verify take the entry's write
//! lock, so two verifications of the same code are serialized and only the
//! first can succeed. Different session ids proceed in parallel.
//!
//! Expired and consumed entries are treated as absent on every read, so
//! correctness never depends on the background reaper. The reaper only keeps
//! the map small; removing an entry that is already gone is a no-op.

use crate::config::LedgerConfig;
use dashmap::DashMap;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Observable flags of a PIN session
///
/// Both flags are false for a session that was never generated, has
/// expired, or was removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinStatus {
    pub viewed: bool,
    pub used: bool,
}

#[derive(Debug)]
struct PinEntry {
    code: String,
    created_at: Instant,
    viewed: bool,
    used_at: Option<Instant>,
}

impl PinEntry {
    fn is_live(&self, now: Instant, ttl: Duration, grace: Duration) -> bool {
        if now >= self.created_at + ttl {
            return false;
        }
        match self.used_at {
            Some(used_at) => now < used_at + grace,
            None => true,
        }
    }
}

/// In-memory store of PIN sessions
///
/// Create one per process and share it behind an `Arc`; sessions do not
/// survive a restart.
#[derive(Debug)]
pub struct PinSessions {
    sessions: DashMap<String, PinEntry>,
    ttl: Duration,
    grace: Duration,
}

impl PinSessions {
    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `ttl` - Lifetime of a code, measured from its generation
    /// * `grace` - How long a used code stays in the map before it is gone
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            grace,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.pin_ttl, config.pin_grace)
    }

    /// Generate a fresh code for the session
    ///
    /// Any previous code of the session is discarded and the TTL restarts.
    ///
    /// # Returns
    ///
    /// The six-digit code, zero padded
    pub fn generate(&self, session_id: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        self.sessions.insert(
            session_id.to_string(),
            PinEntry {
                code: code.clone(),
                created_at: Instant::now(),
                viewed: false,
                used_at: None,
            },
        );

        debug!(session = %session_id, "PIN generated");
        code
    }

    /// Reveal the session's code and mark it viewed
    ///
    /// # Returns
    ///
    /// * `Some(code)` - If the session exists, has not expired and is unused
    /// * `None` - Otherwise; the caller cannot tell which case applied
    pub fn view(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        let mut entry = self.sessions.get_mut(session_id)?;
        if !entry.is_live(now, self.ttl, self.grace) || entry.used_at.is_some() {
            return None;
        }

        entry.viewed = true;
        debug!(session = %session_id, "PIN viewed");
        Some(entry.code.clone())
    }

    /// Consume the session's code
    ///
    /// Succeeds only for a live, viewed, unused session whose code matches.
    /// On success the code is marked used and stays around for the grace
    /// period, during which further verifications return false.
    pub fn verify(&self, session_id: &str, candidate: &str) -> bool {
        let now = Instant::now();
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return false;
        };
        if !entry.is_live(now, self.ttl, self.grace)
            || !entry.viewed
            || entry.used_at.is_some()
            || entry.code != candidate
        {
            debug!(session = %session_id, "PIN verification rejected");
            return false;
        }

        entry.used_at = Some(now);
        debug!(session = %session_id, "PIN verified");
        true
    }

    pub fn status(&self, session_id: &str) -> PinStatus {
        let now = Instant::now();
        match self.sessions.get(session_id) {
            Some(entry) if entry.is_live(now, self.ttl, self.grace) => PinStatus {
                viewed: entry.viewed,
                used: entry.used_at.is_some(),
            },
            _ => PinStatus::default(),
        }
    }

    /// Remove the session immediately
    ///
    /// # Returns
    ///
    /// Whether an entry was removed; removing an absent session is not an error.
    pub fn invalidate(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session = %session_id, "PIN invalidated");
        }
        removed
    }

    /// Remove every expired or grace-elapsed entry
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.sessions.retain(|_, entry| {
            let live = entry.is_live(now, self.ttl, self.grace);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of entries currently held, including ones awaiting the reaper
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start the background sweep of expired sessions
    ///
    /// Must be called from within a tokio runtime. The task holds only a weak
    /// reference, so it also ends once the store is dropped.
    ///
    /// # Arguments
    ///
    /// * `period` - Time between sweeps
    ///
    /// # Returns
    ///
    /// A handle that stops the task on [`PinReaper::shutdown`] or when dropped
    pub fn spawn_reaper(self: &Arc<Self>, period: Duration) -> PinReaper {
        let token = CancellationToken::new();
        let sessions: Weak<Self> = Arc::downgrade(self);
        let cancelled = token.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(sessions) = sessions.upgrade() else {
                            break;
                        };
                        let removed = sessions.purge_expired();
                        if removed > 0 {
                            trace!(removed, remaining = sessions.len(), "Reaped PIN sessions");
                        }
                    }
                }
            }
            debug!("PIN reaper stopped");
        });

        PinReaper {
            token,
            handle: Some(handle),
        }
    }
}

impl Default for PinSessions {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

/// Handle to the background PIN reaper
///
/// Dropping the handle cancels the task without waiting for it.
#[derive(Debug)]
pub struct PinReaper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PinReaper {
    /// Stop the reaper and wait for its task to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "PIN reaper task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for PinReaper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
