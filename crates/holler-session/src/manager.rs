//! The guest session manager: produces and caches the identity/credential
//! pair the chat transport authenticates with.

use serde::Deserialize;
use tracing::{debug, info, warn};

use holler_shared::constants::{AUTH_SESSION_PATH, GUEST_ID_SLOT, GUEST_TOKEN_SLOT};
use holler_shared::types::GuestId;

use crate::error::SessionError;
use crate::store::SessionStore;
use crate::Result;

/// JSON envelope the auth service wraps every response in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ApiEnvelope {
    /// The only success shape: `status == "OK"` with a non-empty payload.
    fn credential(self) -> Result<String> {
        match self.data {
            Some(token) if self.status == "OK" && !token.is_empty() => Ok(token),
            _ => Err(SessionError::Rejected {
                status: self.status,
                message: self.message,
            }),
        }
    }
}

/// Debug view of the persisted session, with the credential truncated so it
/// never lands in logs whole.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub identity: Option<GuestId>,
    pub credential_preview: Option<String>,
}

/// Owns the session store and the auth exchange.
///
/// Identity generation is local and infallible in principle; the only
/// failure mode is the backing file refusing writes. The credential is
/// written if and only if the exchange succeeds, so a failed
/// [`init_session`](Self::init_session) leaves the credential slot exactly
/// as it was.
pub struct SessionManager {
    store: SessionStore,
    http: reqwest::Client,
    auth_base: String,
}

impl SessionManager {
    /// `auth_base` is the auth service root, e.g. `https://shop.example.com/auth`.
    pub fn new(auth_base: impl Into<String>, store: SessionStore) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            auth_base: auth_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Return the stored identity, or generate and persist a fresh one.
    /// Calling this twice always yields the same value.
    pub fn get_or_create_identity(&self) -> Result<GuestId> {
        if let Some(id) = self.stored_identity() {
            return Ok(id);
        }

        let id = GuestId::generate();
        self.store.set(GUEST_ID_SLOT, &id.to_string())?;
        info!(guest = %id.short(), "generated new guest identity");
        Ok(id)
    }

    /// Pure read of the persisted identity. An unparseable slot is treated
    /// as absent so the next `get_or_create_identity` replaces it.
    pub fn stored_identity(&self) -> Option<GuestId> {
        let raw = self.store.get(GUEST_ID_SLOT)?;
        match GuestId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "stored guest identity is not a UUID, ignoring");
                None
            }
        }
    }

    /// Pure read of the persisted credential.
    pub fn stored_credential(&self) -> Option<String> {
        self.store.get(GUEST_TOKEN_SLOT)
    }

    /// Ensure an identity exists, then exchange it for an access credential.
    ///
    /// On success the credential is persisted and returned. On any failure
    /// the credential slot is left untouched; the caller's recovery is to
    /// call this again.
    pub async fn init_session(&self) -> Result<String> {
        let identity = self.get_or_create_identity()?;

        let url = format!("{}{}?uuid={}", self.auth_base, AUTH_SESSION_PATH, identity);
        debug!(url = %url, "requesting guest session");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.to_string(),
                message: Some(body),
            });
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body)?;
        let token = envelope.credential()?;

        self.store.set(GUEST_TOKEN_SLOT, &token)?;
        info!(guest = %identity.short(), "guest session initialised");
        Ok(token)
    }

    /// Delete both stored values. Used by logout/reset flows.
    pub fn clear_session(&self) -> Result<()> {
        self.store.remove(GUEST_TOKEN_SLOT)?;
        self.store.remove(GUEST_ID_SLOT)?;
        info!("guest session cleared");
        Ok(())
    }

    /// Snapshot for diagnostics output.
    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.stored_identity(),
            credential_preview: self.stored_credential().map(|t| {
                let head: String = t.chars().take(12).collect();
                format!("{head}…")
            }),
        }
    }
}
