use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime},
};

use dashmap::DashMap;
use passkey_rp_types::Bytes;
use serde::Serialize;
use typeshare::typeshare;

use crate::StoreError;


/// Which ceremony a challenge was issued for.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CeremonyKind {
    /// Creating a new credential.
    Registration,
    /// Proving possession of a registered credential.
    Authentication,
}

/// An in-flight ceremony: the challenge that was issued to an identity and is expected back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCeremony {
    /// The identity that started the ceremony.
    pub identity: String,
    /// Whether the challenge was issued by a registration or an authentication.
    pub kind: CeremonyKind,
    /// The exact challenge bytes the client data must carry.
    pub expected_challenge: Bytes,
    /// When the challenge was issued.
    pub issued_at: SystemTime,
}

impl PendingCeremony {
    /// A ceremony issued now.
    pub fn new(identity: impl Into<String>, kind: CeremonyKind, challenge: impl Into<Bytes>) -> Self {
        Self {
            identity: identity.into(),
            kind,
            expected_challenge: challenge.into(),
            issued_at: SystemTime::now(),
        }
    }
}

/// Binds in-flight ceremonies to identities. At most one ceremony is pending per identity.
#[async_trait::async_trait]
pub trait SessionStore {
    /// Record a pending ceremony, replacing whatever was pending for the same identity.
    async fn put(&self, ceremony: PendingCeremony) -> Result<(), StoreError>;

    /// Atomically retrieve and remove the identity's pending ceremony.
    ///
    /// Returns [`StoreError::NotFound`] if nothing is pending, if it was already taken or if it
    /// has expired. Two concurrent calls never both receive the same ceremony.
    async fn take(&self, identity: &str) -> Result<PendingCeremony, StoreError>;

    /// Drop every expired ceremony, returning how many were removed.
    ///
    /// Expired ceremonies are never handed out by [`Self::take`], but stores that do not sweep
    /// by themselves keep them until this is called.
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// The number of ceremonies currently held, expired or not.
    async fn len(&self) -> Result<usize, StoreError>;

    /// Whether no ceremony is held.
    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}

/// Expired ceremonies are swept on every this many `put`s.
const SWEEP_INTERVAL: usize = 64;

struct Entry {
    ceremony: PendingCeremony,
    /// `None` when the TTL reaches past what an [`Instant`] can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-memory [`SessionStore`], sharded so identities do not contend with each other.
///
/// Ceremonies abandoned by their identity are swept out every few puts, so the store stays
/// bounded without a background task. [`SessionStore::purge_expired`] sweeps on demand.
pub struct MemorySessionStore {
    pending: DashMap<String, Entry>,
    ttl: Duration,
    puts: AtomicUsize,
}

impl MemorySessionStore {
    /// A store whose ceremonies expire `ttl` after being put. A TTL too large to represent, such
    /// as [`Duration::MAX`], never expires.
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
            puts: AtomicUsize::new(0),
        }
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.pending.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            log::debug!("purged {removed} expired ceremonies");
        }
        removed
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(crate::CeremonyPolicy::default().session_ttl)
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("pending", &self.pending.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, ceremony: PendingCeremony) -> Result<(), StoreError> {
        if self.puts.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep();
        }
        let entry = Entry {
            expires_at: Instant::now().checked_add(self.ttl),
            ceremony,
        };
        if self
            .pending
            .insert(entry.ceremony.identity.clone(), entry)
            .is_some()
        {
            log::debug!("replaced a pending ceremony");
        }
        Ok(())
    }

    async fn take(&self, identity: &str) -> Result<PendingCeremony, StoreError> {
        let (_, entry) = self.pending.remove(identity).ok_or(StoreError::NotFound)?;
        if entry.is_live(Instant::now()) {
            Ok(entry.ceremony)
        } else {
            log::debug!("pending ceremony for {identity} expired");
            Err(StoreError::NotFound)
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(self.sweep())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.pending.len())
    }
}

#[async_trait::async_trait]
impl<S> SessionStore for Arc<S>
where
    S: SessionStore + Send + Sync,
{
    async fn put(&self, ceremony: PendingCeremony) -> Result<(), StoreError> {
        self.as_ref().put(ceremony).await
    }

    async fn take(&self, identity: &str) -> Result<PendingCeremony, StoreError> {
        self.as_ref().take(identity).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.as_ref().purge_expired().await
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.as_ref().len().await
    }
}
