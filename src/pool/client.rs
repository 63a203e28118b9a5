//! Minimal `russh` client handler: password auth only, host keys always accepted.
//!
//! Unlike an interactive terminal client, a diagnostic sniffer on a trusted network has no
//! user present to confirm a host key, and the spec explicitly calls for an accept-any policy
//! (§4.1, §6). There is no known_hosts store and no TOFU state to track.

use russh::client;
use russh::keys::PublicKey;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::transport::Transport;
use crate::error::PoolError;

/// Handler passed to `russh::client::connect`. Holds nothing but the peer's address, which is
/// only used for log messages.
pub struct SniffClientHandler {
    address: String,
    port: u16,
}

impl client::Handler for SniffClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        debug!(
            "accepting host key for {}:{} (accept-any policy)",
            self.address, self.port
        );
        Ok(true)
    }
}

/// Connect to `address:port` and authenticate with `username`/`password`, returning a
/// `Transport` that owns the resulting session for the rest of its life.
pub async fn connect(
    address: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<Transport, PoolError> {
    let addr_string = format!("{address}:{port}");
    let socket_addr = addr_string
        .to_socket_addrs()
        .map_err(|e| connect_failed(address, port, format!("failed to resolve address: {e}")))?
        .next()
        .ok_or_else(|| connect_failed(address, port, "no address found".to_string()))?;

    let config = client::Config {
        inactivity_timeout: None,
        ..Default::default()
    };

    let handler = SniffClientHandler {
        address: address.to_string(),
        port,
    };

    let mut handle = tokio::time::timeout(
        Duration::from_secs(30),
        client::connect(Arc::new(config), socket_addr, handler),
    )
    .await
    .map_err(|_| connect_failed(address, port, "connection timed out".to_string()))?
    .map_err(|e| connect_failed(address, port, e.to_string()))?;

    info!("SSH handshake completed for {}:{}", address, port);

    let authenticated = handle
        .authenticate_password(username, password)
        .await
        .map_err(|e| connect_failed(address, port, e.to_string()))?;

    if !authenticated.success() {
        return Err(connect_failed(
            address,
            port,
            "authentication rejected by server".to_string(),
        ));
    }

    info!("SSH authentication successful for {}:{}", address, port);
    Ok(Transport::spawn(handle))
}

fn connect_failed(address: &str, port: u16, reason: String) -> PoolError {
    PoolError::ConnectFailed {
        address: address.to_string(),
        port,
        reason,
    }
}
