//! SSH Connection Pool (C1): open, share, and close authenticated SSH sessions keyed by
//! `(address, port)`, issuing lease tokens that track how many callers currently depend on a
//! transport.
//!
//! A single pool instance is constructed once, at supervisor startup, and handed to every
//! worker as an explicit `Arc<ConnectionPool>` dependency — per the spec's redesign note, this
//! replaces the source's lazily-initialized singleton with ordinary ownership.

mod client;
mod transport;

pub use client::SniffClientHandler;
pub use transport::Transport;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PoolError;
use crate::ids::random_unique_id;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConnectionKey {
    address: String,
    port: u16,
}

struct PoolState {
    connections: HashMap<ConnectionKey, Transport>,
    leases: HashMap<String, ConnectionKey>,
    refs: HashMap<ConnectionKey, u32>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            leases: HashMap::new(),
            refs: HashMap::new(),
        }
    }
}

/// Process-scoped shared state: exactly one `ConnectionPool` per supervisor process. All
/// mutation is serialized through a single mutex, including transport establishment, so that
/// concurrent first-acquisitions of the same key are guaranteed to produce exactly one
/// transport (spec §4.1).
pub struct ConnectionPool {
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::new()),
        }
    }

    /// Mint a lease for `(address, port)`, opening a new transport if none exists yet.
    /// Credentials supplied on a request that reuses an existing transport are ignored —
    /// the credentials of whichever request created it stand.
    pub async fn acquire(
        &self,
        address: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<(String, Transport), PoolError> {
        let mut state = self.state.lock().await;
        let key = ConnectionKey {
            address: address.to_string(),
            port,
        };

        let transport = match state.connections.get(&key) {
            Some(existing) => {
                debug!("reusing existing transport for {}:{}", address, port);
                existing.clone()
            }
            None => {
                let transport = client::connect(address, port, username, password).await?;
                state.connections.insert(key.clone(), transport.clone());
                transport
            }
        };

        let taken: HashSet<String> = state.leases.keys().cloned().collect();
        let lease_id = random_unique_id(&taken);
        state.leases.insert(lease_id.clone(), key.clone());
        *state.refs.entry(key).or_insert(0) += 1;

        Ok((lease_id, transport))
    }

    /// Revoke a lease. If it was the last lease referencing its key, the transport is torn
    /// down. Fails with `UnknownLease` if the id is not currently live.
    pub async fn release(&self, lease_id: &str) -> Result<(), PoolError> {
        let mut state = self.state.lock().await;
        let key = state
            .leases
            .remove(lease_id)
            .ok_or_else(|| PoolError::UnknownLease {
                lease_id: lease_id.to_string(),
            })?;

        if let Some(count) = state.refs.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                state.refs.remove(&key);
                if let Some(transport) = state.connections.remove(&key) {
                    transport.disconnect().await;
                }
            }
        }
        Ok(())
    }

    /// Close every transport and clear the lease table. Idempotent; any lease id issued
    /// before this call subsequently fails `release` with `UnknownLease`.
    pub async fn destroy_all(&self) {
        let mut state = self.state.lock().await;
        for (_, transport) in state.connections.drain() {
            transport.disconnect().await;
        }
        state.leases.clear();
        state.refs.clear();
        info!("destroyed all pooled SSH transports");
    }

    /// Number of distinct open transports, for diagnostics and tests.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Scoped acquisition: the returned guard releases its lease when dropped, and offers an
    /// explicit, deterministic `release()` for the common path where the caller wants the
    /// transport torn down (if it was the last lease) before proceeding.
    pub async fn scoped(
        self: &Arc<Self>,
        address: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<LeaseGuard, PoolError> {
        let (lease_id, transport) = self.acquire(address, port, username, password).await?;
        Ok(LeaseGuard {
            pool: self.clone(),
            lease_id: Some(lease_id),
            transport,
        })
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Guarantees lease release on every exit path: explicit `release()` for the normal path,
/// and a `Drop` fallback (which releases on a spawned task, since `Drop` cannot `await`) for
/// panics or early returns.
pub struct LeaseGuard {
    pool: Arc<ConnectionPool>,
    lease_id: Option<String>,
    transport: Transport,
}

impl LeaseGuard {
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn lease_id(&self) -> &str {
        self.lease_id.as_deref().expect("lease_id taken twice")
    }

    /// Release deterministically, awaiting the pool's teardown of the underlying transport
    /// if this was its last lease.
    pub async fn release(mut self) {
        if let Some(lease_id) = self.lease_id.take() {
            let _ = self.pool.release(&lease_id).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(lease_id) = self.lease_id.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                let _ = pool.release(&lease_id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_starts_with_no_connections() {
        let pool = ConnectionPool::new();
        // connection_count is async; exercised in the worker/supervisor integration tests
        // where a runtime is already present. Here we only check construction succeeds.
        drop(pool);
    }

    #[tokio::test]
    async fn unknown_lease_release_fails() {
        let pool = ConnectionPool::new();
        let err = pool.release("NOTALEASE").await.unwrap_err();
        match err {
            PoolError::UnknownLease { lease_id } => assert_eq!(lease_id, "NOTALEASE"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroy_all_is_idempotent_on_empty_pool() {
        let pool = ConnectionPool::new();
        pool.destroy_all().await;
        pool.destroy_all().await;
        assert_eq!(pool.connection_count().await, 0);
    }
}
