use super::types::{ComponentState, ShutdownHandle, ShutdownReason};
use crate::config::WastebinConfig;
use crate::error::Result;
use crate::pipeline::PipelineContext;
use crate::streaming::{StreamServer, StreamServerBuilder};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Main application coordinator that owns the pipeline and the HTTP server
pub struct WastebinOrchestrator {
    pub(super) config: WastebinConfig,
    pub(super) ctx: Arc<PipelineContext>,
    pub(super) stream_server: Option<Arc<StreamServer>>,

    // Background tasks started by `start`
    pub(super) server_task: Option<JoinHandle<Result<()>>>,
    pub(super) relay_task: Option<JoinHandle<()>>,
    pub(super) local_addr: Option<SocketAddr>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl WastebinOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub fn new(config: WastebinConfig) -> Result<Self> {
        let ctx = Arc::new(PipelineContext::new(config.clone()));
        Self::with_context(config, ctx)
    }

    /// Create an orchestrator around an already built pipeline context
    pub fn with_context(config: WastebinConfig, ctx: Arc<PipelineContext>) -> Result<Self> {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let shutdown_handle = ShutdownHandle::new(shutdown_sender);

        let stream_server = StreamServerBuilder::new()
            .config(config.stream.clone())
            .context(Arc::clone(&ctx))
            .build()?;

        Ok(Self {
            cancellation_token: ctx.shutdown_token(),
            config,
            ctx,
            stream_server: Some(Arc::new(stream_server)),
            server_task: None,
            relay_task: None,
            local_addr: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_handle,
            shutdown_receiver: Some(shutdown_receiver),
        })
    }

    pub fn context(&self) -> Arc<PipelineContext> {
        Arc::clone(&self.ctx)
    }

    /// Address the HTTP server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Handle that makes `run` return, usable from other tasks
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }
}
