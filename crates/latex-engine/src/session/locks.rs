//! Per-session mutual exclusion
//!
//! Appends and compiles for the same token are serialized so a compile never
//! reads an archive while a chunk is still being written, and two compiles
//! of one session cannot race on cleanup. Different tokens never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::token::SessionToken;

/// Held for the duration of one append or compile call
pub type SessionGuard = OwnedMutexGuard<()>;

/// Lock table keyed by session token
#[derive(Debug, Default)]
pub struct SessionLocks {
    table: Mutex<HashMap<SessionToken, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `token`
    pub async fn acquire(&self, token: &SessionToken) -> SessionGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the table still references are idle.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(token.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
