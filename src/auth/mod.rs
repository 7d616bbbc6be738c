pub mod registry;

pub use registry::TokenRegistry;

use crate::command::split_token_prefix;
use tracing::warn;

/// Authorization collaborator
///
/// Token format and storage are opaque to the gateway; it only needs these
/// three questions answered.
pub trait Authorizer: Send + Sync {
    /// Whether `address` is invited to register and execute
    fn is_authorized(&self, address: &str) -> bool;

    /// The address a token was issued to, or `None` if it is not valid
    fn verify_token(&self, token: &str) -> Option<String>;

    /// Mint a token bound to `address`
    fn generate_token(&self, address: &str) -> String;
}

/// Check an inbound message's sender and leading token
///
/// The sender must be authorized and the message must begin with
/// `token:<token>` for a token issued to that same sender.
pub fn authenticate_message(authorizer: &dyn Authorizer, text: &str, sender: &str) -> bool {
    if !authorizer.is_authorized(sender) {
        warn!(sender, "Unauthorized sender");
        return false;
    }

    let Some(token) = split_token_prefix(text).0 else {
        warn!(sender, "No token found in message");
        return false;
    };

    match authorizer.verify_token(token) {
        Some(address) if address == sender => true,
        Some(_) => {
            warn!(sender, "Token issued to a different address");
            false
        }
        None => {
            warn!(sender, "Invalid token");
            false
        }
    }
}
