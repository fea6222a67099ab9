//! Browser session pool.
//!
//! Bounds how many browser sessions are in use at once and, under
//! [`SessionStrategy::Pooled`], keeps idle sessions around for the next
//! record instead of paying a Chrome start-up per file.
//!
//! A [`Lease`] is exclusive: one conversion at a time per session. Leases
//! must be handed back through [`SessionPool::release`] so the session is
//! closed or parked asynchronously; a lease that is simply dropped still
//! frees its concurrency slot and drops the session.

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::SessionStrategy;
use crate::error::BrowserError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Hands out browser sessions.
pub struct SessionPool {
    launcher: Arc<dyn BrowserLauncher>,
    strategy: SessionStrategy,
    permits: Option<Arc<Semaphore>>,
    idle: Mutex<Vec<Box<dyn BrowserSession>>>,
    launched: AtomicUsize,
    closed: AtomicBool,
}

/// A session checked out of the pool.
pub struct Lease {
    session: Box<dyn BrowserSession>,
    reused: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Lease {
    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }

    /// Whether the session already served an earlier record.
    pub fn is_reused(&self) -> bool {
        self.reused
    }
}

impl SessionPool {
    /// `max_sessions = None` leaves concurrency unbounded.
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        strategy: SessionStrategy,
        max_sessions: Option<usize>,
    ) -> Self {
        Self {
            launcher,
            strategy,
            permits: max_sessions.map(|n| Arc::new(Semaphore::new(n))),
            idle: Mutex::new(Vec::new()),
            launched: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of sessions launched so far.
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Number of parked sessions.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Wait for a free slot, then take an idle session or launch one.
    pub async fn acquire(&self) -> Result<Lease, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::Launch("session pool is shut down".into()));
        }
        let permit = match self.permits {
            Some(ref sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| BrowserError::Launch("session pool is shut down".into()))?,
            ),
            None => None,
        };

        if self.strategy == SessionStrategy::Pooled {
            if let Some(session) = self.take_idle() {
                return Ok(Lease {
                    session,
                    reused: true,
                    _permit: permit,
                });
            }
        }

        let session = self.launch().await?;
        Ok(Lease {
            session,
            reused: false,
            _permit: permit,
        })
    }

    /// Replace the leased session with a freshly launched one, keeping the
    /// slot. The old session is closed.
    pub async fn relaunch(&self, lease: &mut Lease) -> Result<(), BrowserError> {
        let fresh = self.launch().await?;
        let stale = std::mem::replace(&mut lease.session, fresh);
        lease.reused = false;
        close_quietly(stale).await;
        Ok(())
    }

    /// Return a lease. Healthy sessions are parked under the pooled
    /// strategy; everything else is closed.
    pub async fn release(&self, lease: Lease, healthy: bool) {
        let Lease {
            session, _permit, ..
        } = lease;

        if healthy && self.strategy == SessionStrategy::Pooled {
            if let Ok(mut idle) = self.idle.lock() {
                // Checked under the lock so a concurrent shutdown either
                // drains this session or makes us close it.
                if !self.is_closed() {
                    idle.push(session);
                    return;
                }
            }
        }
        close_quietly(session).await;
        // `_permit` drops here, after teardown, so a new session never
        // starts before the old one is gone.
    }

    /// Close every parked session and refuse further leases.
    ///
    /// Leases still out are closed when they come back.
    pub async fn shutdown(&self) {
        let parked: Vec<_> = match self.idle.lock() {
            Ok(mut idle) => {
                self.closed.store(true, Ordering::SeqCst);
                idle.drain(..).collect()
            }
            Err(_) => {
                self.closed.store(true, Ordering::SeqCst);
                Vec::new()
            }
        };
        if let Some(ref sem) = self.permits {
            sem.close();
        }
        debug!("Shutting down session pool ({} idle)", parked.len());
        for session in parked {
            close_quietly(session).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_idle(&self) -> Option<Box<dyn BrowserSession>> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let session = self.launcher.launch().await?;
        let n = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Browser session #{} started", n);
        Ok(session)
    }
}

async fn close_quietly(session: Box<dyn BrowserSession>) {
    if let Err(e) = session.close().await {
        warn!("Browser session did not close cleanly: {}", e);
    }
}
