use crate::auth::Authorizer;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct IssuedToken {
    address: String,
    expires_at: DateTime<Utc>,
}

/// In-memory authorizer: an invitation list plus opaque random tokens
///
/// Tokens are looked up, not decoded, so any alteration fails closed. Expired
/// tokens are dropped on first use.
#[derive(Debug)]
pub struct TokenRegistry {
    authorized: HashSet<String>,
    tokens: Mutex<HashMap<String, IssuedToken>>,
    ttl: Duration,
}

impl TokenRegistry {
    pub fn new<I, S>(authorized: I, ttl: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authorized: authorized.into_iter().map(Into::into).collect(),
            tokens: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, HashMap<String, IssuedToken>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of live (unexpired) tokens
    pub fn active_tokens(&self) -> usize {
        let now = Utc::now();
        self.lock_tokens()
            .values()
            .filter(|t| t.expires_at > now)
            .count()
    }

    /// Drop every token issued to `address`
    pub fn revoke(&self, address: &str) -> usize {
        let mut tokens = self.lock_tokens();
        let before = tokens.len();
        tokens.retain(|_, issued| issued.address != address);
        before - tokens.len()
    }
}

impl Authorizer for TokenRegistry {
    fn is_authorized(&self, address: &str) -> bool {
        self.authorized.contains(address)
    }

    fn verify_token(&self, token: &str) -> Option<String> {
        let mut tokens = self.lock_tokens();
        let issued = tokens.get(token)?.clone();

        if issued.expires_at <= Utc::now() {
            tokens.remove(token);
            return None;
        }

        Some(issued.address)
    }

    fn generate_token(&self, address: &str) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let now = Utc::now();
        let issued = IssuedToken {
            address: address.to_string(),
            expires_at: now + self.ttl,
        };

        let mut tokens = self.lock_tokens();
        tokens.retain(|_, t| t.expires_at > now);
        tokens.insert(token.clone(), issued);

        token
    }
}
