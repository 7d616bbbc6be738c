use crate::auth::authenticate_message;
use crate::gateway::GatewayCore;
use crate::messaging::InboundMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Reply to any unauthenticated message that is not a registration
pub const AUTH_REQUIRED: &str = "❌ Authentication required. Send: register:<your-address>";

const REGISTER_PREFIX: &str = "register:";

/// Consume inbound messages until the channel closes
pub(crate) async fn run(core: Arc<GatewayCore>, mut inbound: mpsc::Receiver<InboundMessage>) {
    debug!("Inbound pipeline started");
    while let Some(message) = inbound.recv().await {
        core.handle_inbound(message).await;
    }
    debug!("Inbound channel closed");
}

fn registration_address(text: &str) -> Option<&str> {
    let address = text.trim().strip_prefix(REGISTER_PREFIX)?.trim();
    (!address.is_empty()).then_some(address)
}

impl GatewayCore {
    pub(crate) async fn handle_inbound(&self, message: InboundMessage) {
        let sender = message.sender.as_str();

        if !authenticate_message(self.authorizer.as_ref(), &message.text, sender) {
            match registration_address(&message.text) {
                Some(address) => self.handle_registration(sender, address).await,
                None => {
                    self.audit_rejection(sender, "authentication required");
                    self.reply(sender, AUTH_REQUIRED).await;
                }
            }
            return;
        }

        let Some(mut command) = self.parser.parse(&message.text) else {
            debug!(id = %message.id, sender, "Message is not a command");
            return;
        };

        // Waits here when the in-flight bound is reached
        let permit = match self.in_flight.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "In-flight limiter closed");
                return;
            }
        };

        info!(
            id = command.id(),
            command_type = %command.command_type(),
            sender,
            "Dispatching command"
        );

        let processor = self.processor.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let result = processor.process(&mut command).await;
            if !result.success {
                warn!(
                    id = command.id(),
                    error = result.error.as_deref().unwrap_or(""),
                    "Command execution failed"
                );
            }
        });
    }

    /// Self-service bootstrap: only an invited sender registering itself
    /// receives a token
    async fn handle_registration(&self, sender: &str, address: &str) {
        if address != sender || !self.authorizer.is_authorized(address) {
            warn!(sender, address, "Registration refused");
            self.audit_rejection(sender, "registration refused");
            self.reply(sender, AUTH_REQUIRED).await;
            return;
        }

        let token = self.authorizer.generate_token(address);
        info!(address, "Address registered");

        let reply = format!(
            "✅ Registration successful!\nToken: {token}\n\nUse: token:{token} cmd:status",
            token = token
        );
        self.reply(sender, &reply).await;
    }

    async fn reply(&self, address: &str, text: &str) {
        if let Err(e) = self.messenger.send_message(address, text).await {
            error!(address, error = %e, "Failed to send reply");
        }
    }

    fn audit_rejection(&self, sender: &str, reason: &str) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_rejection(sender, reason) {
                warn!(error = %e, "Failed to write audit log");
            }
        }
    }
}
