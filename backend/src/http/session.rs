//! Registry of open HTTP sessions.
//!
//! Each session is a cookie-keeping [`reqwest::Client`] handed out inside a
//! [`SessionGuard`]. Dropping the guard removes the session from the registry,
//! whichever way the caller exits.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Client;

use crate::api::logs::{log_info, log_success};
use crate::error::{HttpError, HttpResult};

#[derive(Debug, Default)]
struct Inner {
    sessions: Mutex<HashMap<u64, Client>>,
    next_id: AtomicU64,
}

/// Tracks every session opened during a run. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session with its own cookie jar.
    pub fn open(&self) -> HttpResult<SessionGuard> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = {
            let mut sessions = self.lock();
            sessions.insert(id, client.clone());
            sessions.len()
        };
        log_info(format!("Opened HTTP session #{} ({} active)", id, active));

        Ok(SessionGuard {
            id,
            client,
            registry: self.clone(),
        })
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Forget every remaining session. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut sessions = self.lock();
            let n = sessions.len();
            sessions.clear();
            n
        };
        if closed > 0 {
            log_success(format!("Closed {} HTTP sessions", closed));
        }
        closed
    }

    fn release(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Client>> {
        self.inner.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A registered session. Derefs to the underlying client.
#[derive(Debug)]
pub struct SessionGuard {
    id: u64,
    client: Client,
    registry: SessionRegistry,
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Deref for SessionGuard {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
