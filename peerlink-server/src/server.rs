//! Server state and listener lifecycle.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::TokenStore;
use crate::config::ServerConfig;
use crate::directory::Directory;
use crate::presence::{self, PresenceEvent};
use crate::protocol::OnlineState;
use crate::registry::SessionRegistry;
use crate::web;

/// Shared state accessible by every session task and HTTP handler.
///
/// Constructed once per process and passed around as an `Arc` — there are
/// no ambient globals.
pub struct SharedState {
    pub config: ServerConfig,
    pub registry: SessionRegistry,
    pub tokens: TokenStore,
    pub directory: Directory,
    /// identity → last known online state, maintained by the presence
    /// broadcaster (identities absent from the map are OFFLINE).
    pub presence_states: Mutex<HashMap<String, OnlineState>>,
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Build SharedState and the presence queue's receiving end.
    ///
    /// Public so tests can drive the registry, router, and broadcaster
    /// without a network listener.
    pub fn build_state(&self) -> Result<(Arc<SharedState>, mpsc::Receiver<PresenceEvent>)> {
        let (directory, accounts) = match &self.config.directory_file {
            Some(path) => Directory::load(path)?,
            None => {
                tracing::info!("no directory file configured, using built-in seed accounts");
                Directory::seed()
            }
        };

        let (presence_tx, presence_rx) = mpsc::channel(self.config.presence_queue);
        let state = Arc::new(SharedState {
            registry: SessionRegistry::new(presence_tx),
            tokens: TokenStore::new(self.config.token_ttl_secs, accounts),
            directory,
            presence_states: Mutex::new(HashMap::new()),
            config: self.config.clone(),
        });
        Ok((state, presence_rx))
    }

    /// Run the server, blocking forever.
    pub async fn run(self) -> Result<()> {
        let (state, presence_rx) = self.build_state()?;
        tokio::spawn(presence::broadcaster(Arc::clone(&state), presence_rx));

        let listener = TcpListener::bind(&state.config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", state.config.listen_addr))?;
        tracing::info!("HTTP/WebSocket listener on {}", listener.local_addr()?);

        let app = web::router(Arc::clone(&state));
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Start the server and return the bound address, the shared state,
    /// and the serving task handle (for testing).
    pub async fn start(self) -> Result<(SocketAddr, Arc<SharedState>, JoinHandle<Result<()>>)> {
        let (state, presence_rx) = self.build_state()?;
        tokio::spawn(presence::broadcaster(Arc::clone(&state), presence_rx));

        let listener = TcpListener::bind(&state.config.listen_addr).await?;
        let addr = listener.local_addr()?;
        tracing::info!("listening on {addr}");

        let app = web::router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
            Ok(())
        });

        Ok((addr, state, handle))
    }
}
