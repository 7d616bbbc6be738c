//! Tool invocation gateway
//!
//! Exposes the command processor, messaging and authorization through five
//! named tools, and runs the inbound message pipeline that feeds the parser
//! and processor. `start`/`stop` wire and unwire the pipeline and the tool
//! transport; both are idempotent.

pub mod pipeline;
pub mod tools;
pub mod transport;

use crate::audit::AuditLogger;
use crate::auth::Authorizer;
use crate::command::{CommandParser, UnknownCommandType};
use crate::messaging::{Messenger, MessagingError};
use crate::processor::CommandProcessor;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use tools::{ContentBlock, ToolDefinition, ToolResponse, list_tools};

/// Default bound on concurrently executing pipeline commands
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unauthorized address: {0}")]
    Unauthorized(String),

    #[error("Address not authorized for registration: {0}")]
    NotInvited(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    UnknownCommandType(#[from] UnknownCommandType),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Sender recorded on commands parsed from inbound messages
    pub origin_address: String,
    pub max_in_flight: usize,
    /// Records refused inbound messages
    pub audit: Option<Arc<AuditLogger>>,
}

impl GatewayOptions {
    pub fn new(origin_address: impl Into<String>) -> Self {
        Self {
            origin_address: origin_address.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            audit: None,
        }
    }
}

/// Shared state behind the pipeline, the tools and the transport
pub(crate) struct GatewayCore {
    pub(crate) processor: Arc<CommandProcessor>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) parser: CommandParser,
    pub(crate) in_flight: Arc<Semaphore>,
    pub(crate) audit: Option<Arc<AuditLogger>>,
}

/// Reader/writer pair the tool transport is served on
pub struct ToolIo {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl ToolIo {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    tasks: Vec<JoinHandle<()>>,
    tool_io: Option<ToolIo>,
}

pub struct Gateway {
    core: Arc<GatewayCore>,
    state: Mutex<RunState>,
}

impl Gateway {
    pub fn new(
        processor: Arc<CommandProcessor>,
        messenger: Arc<dyn Messenger>,
        authorizer: Arc<dyn Authorizer>,
        options: GatewayOptions,
    ) -> Self {
        let core = GatewayCore {
            processor,
            messenger,
            authorizer,
            parser: CommandParser::new(options.origin_address),
            in_flight: Arc::new(Semaphore::new(options.max_in_flight.max(1))),
            audit: options.audit,
        };

        Self {
            core: Arc::new(core),
            state: Mutex::new(RunState::default()),
        }
    }

    /// Serve the tool transport on `io` once the gateway starts
    ///
    /// The pair is consumed by the first `start`; a later restart only
    /// rewires the inbound pipeline.
    pub fn with_tool_io(mut self, io: ToolIo) -> Self {
        self.state.get_mut().tool_io = Some(io);
        self
    }

    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.core.processor
    }

    /// Start the inbound pipeline and the tool transport
    pub async fn start(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().await;
        if state.running {
            warn!("Gateway is already running");
            return Ok(());
        }

        let inbound = self.core.messenger.start_monitoring().await.map_err(|e| {
            error!(error = %e, "Failed to start message monitoring");
            e
        })?;
        state
            .tasks
            .push(tokio::spawn(pipeline::run(self.core.clone(), inbound)));

        if let Some(io) = state.tool_io.take() {
            state
                .tasks
                .push(tokio::spawn(transport::serve(self.core.clone(), io)));
        }

        state.running = true;
        info!(
            origin = self.core.parser.origin_address(),
            project_root = %self.core.processor.settings().project_root.display(),
            "Gateway started"
        );
        Ok(())
    }

    /// Stop monitoring and tear down the pipeline and transport
    ///
    /// Commands already dispatched keep running to completion.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.running {
            warn!("Gateway is not running");
            return;
        }

        state.running = false;
        self.core.messenger.stop_monitoring().await;
        for task in state.tasks.drain(..) {
            task.abort();
        }

        info!("Gateway stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Invoke a named tool with JSON arguments
    pub async fn call_tool(&self, name: &str, args: &Value) -> GatewayResult<ToolResponse> {
        self.core.call_tool(name, args).await
    }

    /// Feed one inbound message through the pipeline without a transport
    pub async fn handle_message(&self, message: crate::messaging::InboundMessage) {
        self.core.handle_inbound(message).await;
    }
}
