//! Server startup and management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::server::{Server, ServerHandle};
use larder_rpc::LarderApiServer;
use larder_search::{
    build_backend, AnalyticsSink, EngineConfig, Instrumentation, JsonLinesSink, SearchOrchestrator, TracingSink,
};
use larder_store::RecipeStore;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Result, ServerError};
use crate::handler::RpcHandler;

const ANALYTICS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the Larder server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,

    /// Recipe catalog directory
    pub catalog_path: PathBuf,

    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 9877)),
            catalog_path: PathBuf::from("recipes.larder"),
            engine: EngineConfig::default(),
        }
    }
}

/// A wired engine plus the task draining its analytics queue
pub struct Engine {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub analytics: JoinHandle<()>,
}

/// Load the catalog and wire backend, instrumentation and orchestrator
pub async fn build_engine(config: &ServerConfig) -> Result<Engine> {
    let mut store = RecipeStore::open(&config.catalog_path).await?;
    let recipes = store.load_all().await?;
    let backend = build_backend(&config.engine, recipes).await?;

    let sink: Arc<dyn AnalyticsSink> = match &config.engine.analytics_log {
        Some(path) => {
            info!("Writing analytics to {:?}", path);
            Arc::new(JsonLinesSink::new(path))
        }
        None => Arc::new(TracingSink),
    };
    let (instrumentation, analytics) = Instrumentation::spawn(sink, config.engine.analytics_queue_capacity);

    let orchestrator = SearchOrchestrator::new(backend, instrumentation, config.engine.clone());
    Ok(Engine {
        orchestrator: Arc::new(orchestrator),
        analytics,
    })
}

/// The Larder server
pub struct LarderServer {
    config: ServerConfig,
    orchestrator: Arc<SearchOrchestrator>,
    handle: Option<ServerHandle>,
    local_addr: Option<SocketAddr>,
}

impl LarderServer {
    pub fn new(config: ServerConfig, orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            handle: None,
            local_addr: None,
        }
    }

    /// Start the server
    pub async fn start(&mut self) -> Result<()> {
        let server = Server::builder()
            .build(&self.config.addr)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;
        let local_addr = server.local_addr()?;

        let handler = RpcHandler::new(Arc::clone(&self.orchestrator));
        let methods = handler.into_rpc();

        info!(
            "Starting Larder server on {} ({} backend)",
            local_addr,
            self.orchestrator.backend().kind()
        );
        self.handle = Some(server.start(methods));
        self.local_addr = Some(local_addr);

        Ok(())
    }

    /// Stop the server
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.stop().map_err(|e| ServerError::Server(e.to_string()))?;
            handle.stopped().await;
            info!("Larder server stopped");
        }
        Ok(())
    }

    /// Wait for the server to finish
    pub async fn wait(&self) {
        if let Some(ref handle) = self.handle {
            handle.clone().stopped().await;
        }
    }

    /// The bound address once started, else the configured one
    pub fn addr(&self) -> SocketAddr {
        self.local_addr.unwrap_or(self.config.addr)
    }
}

/// Start a server and run it until Ctrl+C
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let Engine { orchestrator, analytics } = build_engine(&config).await?;

    let mut server = LarderServer::new(config, orchestrator);
    server.start().await?;

    // Wait for Ctrl+C, or for the server to stop on its own
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        _ = server.wait() => warn!("Server stopped unexpectedly"),
    }

    info!("Shutting down...");
    server.stop().await?;

    // Dropping the last orchestrator closes the analytics queue
    drop(server);
    match tokio::time::timeout(ANALYTICS_DRAIN_TIMEOUT, analytics).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Analytics task ended abnormally: {}", e),
        Err(_) => warn!("Gave up waiting for pending analytics records"),
    }

    Ok(())
}
