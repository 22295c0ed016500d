//! In-memory OAuth state: clients, pending states, codes and tokens.
//!
//! Each map has its own lock. Every read-modify-write (state binding and
//! consumption, code redemption, expired-token eviction) happens under one
//! write guard.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::clock::{Clock, SystemClock};
use super::types::{AccessToken, AuthorizationCode, ClientDescriptor, PendingAuthorization};

/// Prefix shared by minted codes and tokens.
const TOKEN_PREFIX: &str = "mcp_";

/// In-memory OAuth state store.
#[derive(Clone)]
pub struct OAuthStore {
    clients: Arc<RwLock<HashMap<String, ClientDescriptor>>>,
    pending: Arc<RwLock<HashMap<String, PendingAuthorization>>>,
    auth_codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    clock: Arc<dyn Clock>,
}

/// Entries removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub pending: usize,
    pub auth_codes: usize,
    pub access_tokens: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.auth_codes + self.access_tokens
    }
}

impl OAuthStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(RwLock::new(HashMap::new())),
            auth_codes: Arc::new(RwLock::new(HashMap::new())),
            access_tokens: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Current time in Unix seconds, from the store's clock.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// 32 random bytes, base64url without padding.
    #[must_use]
    pub fn generate_state() -> String {
        URL_SAFE_NO_PAD.encode(random_bytes::<32>())
    }

    /// `mcp_` followed by 16 random bytes as hex.
    #[must_use]
    pub fn generate_code() -> String {
        format!("{TOKEN_PREFIX}{}", hex::encode(random_bytes::<16>()))
    }

    /// `mcp_` followed by 32 random bytes as hex.
    #[must_use]
    pub fn generate_access_token() -> String {
        format!("{TOKEN_PREFIX}{}", hex::encode(random_bytes::<32>()))
    }

    // ── Client Registry ──────────────────────────────────────────────────────

    /// Store a client. Re-registering an id overwrites it.
    pub async fn register_client(&self, client: ClientDescriptor) {
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    /// Look up a client by ID.
    pub async fn get_client(&self, client_id: &str) -> Option<ClientDescriptor> {
        self.clients.read().await.get(client_id).cloned()
    }

    // ── State/PKCE Binder ────────────────────────────────────────────────────

    /// Bind a state token to its pending authorization.
    ///
    /// Returns `false` and leaves the existing binding untouched when the
    /// state is already pending.
    #[must_use]
    pub async fn bind_state(&self, state: String, pending: PendingAuthorization) -> bool {
        match self.pending.write().await.entry(state) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(pending);
                true
            }
        }
    }

    /// Read-and-delete the pending authorization for `state`.
    ///
    /// Entries older than `max_age` seconds are removed and reported absent.
    pub async fn take_state(&self, state: &str, max_age: u64) -> Option<PendingAuthorization> {
        let pending = self.pending.write().await.remove(state)?;
        if pending.is_stale(self.now(), max_age) {
            tracing::debug!("Discarded stale authorization state");
            return None;
        }
        Some(pending)
    }

    // ── Authorization Code Store ─────────────────────────────────────────────

    pub async fn insert_auth_code(&self, code: AuthorizationCode) {
        self.auth_codes.write().await.insert(code.code.clone(), code);
    }

    /// Look up a code issued to `client_id` without consuming it.
    ///
    /// Expired codes are evicted. A code bound to another client is reported
    /// absent and left in place.
    pub async fn load_auth_code(&self, code: &str, client_id: &str) -> Option<AuthorizationCode> {
        let now = self.now();
        let mut codes = self.auth_codes.write().await;
        let entry = codes.get(code)?;
        if entry.is_expired(now) {
            codes.remove(code);
            return None;
        }
        (entry.client_id == client_id).then(|| entry.clone())
    }

    /// Consume a code (one-time use).
    ///
    /// Returns the code only if it exists, is unexpired and belongs to
    /// `client_id`; only then is it removed. Expired codes are removed too.
    pub async fn consume_auth_code(&self, code: &str, client_id: &str) -> Option<AuthorizationCode> {
        let now = self.now();
        let mut codes = self.auth_codes.write().await;
        let entry = codes.get(code)?;
        if entry.is_expired(now) {
            codes.remove(code);
            return None;
        }
        if entry.client_id != client_id {
            return None;
        }
        codes.remove(code)
    }

    // ── Access Token Store ───────────────────────────────────────────────────

    pub async fn insert_access_token(&self, token: AccessToken) {
        self.access_tokens.write().await.insert(token.token.clone(), token);
    }

    /// Validate an access token, evicting it if it has expired.
    pub async fn validate_access_token(&self, token: &str) -> Option<AccessToken> {
        let now = self.now();
        {
            let tokens = self.access_tokens.read().await;
            let access = tokens.get(token)?;
            if !access.is_expired(now) {
                return Some(access.clone());
            }
        }

        // Expired: re-check under the write lock before evicting.
        let mut tokens = self.access_tokens.write().await;
        if tokens.get(token).is_some_and(|t| t.is_expired(now)) {
            tokens.remove(token);
            tracing::debug!("Evicted expired access token");
        }
        None
    }

    /// Delete a token if present. Returns whether anything was removed.
    pub async fn revoke_access_token(&self, token: &str) -> bool {
        self.access_tokens.write().await.remove(token).is_some()
    }

    // ── Housekeeping ─────────────────────────────────────────────────────────

    /// Remove expired codes and tokens and pending states older than `pending_max_age`.
    pub async fn sweep_expired(&self, pending_max_age: u64) -> SweepReport {
        let now = self.now();
        let mut report = SweepReport::default();

        {
            let mut pending = self.pending.write().await;
            let before = pending.len();
            pending.retain(|_, p| !p.is_stale(now, pending_max_age));
            report.pending = before - pending.len();
        }

        {
            let mut codes = self.auth_codes.write().await;
            let before = codes.len();
            codes.retain(|_, c| !c.is_expired(now));
            report.auth_codes = before - codes.len();
        }

        {
            let mut tokens = self.access_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, t| !t.is_expired(now));
            report.access_tokens = before - tokens.len();
        }

        report
    }

    /// Start background cleanup task for expired entries.
    pub fn start_cleanup_task(&self, interval: Duration, pending_max_age: u64) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = store.sweep_expired(pending_max_age).await;
                if report.total() > 0 {
                    tracing::debug!(
                        pending = report.pending,
                        auth_codes = report.auth_codes,
                        access_tokens = report.access_tokens,
                        "Swept expired OAuth entries"
                    );
                }
            }
        })
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn auth_code_count(&self) -> usize {
        self.auth_codes.read().await.len()
    }

    pub async fn access_token_count(&self) -> usize {
        self.access_tokens.read().await.len()
    }
}

impl Default for OAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OAuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStore").field("clock", &self.clock).finish()
    }
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
