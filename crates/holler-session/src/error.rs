use thiserror::Error;

/// Errors produced by the session store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (reading or atomically replacing the session file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session file on disk is not valid JSON.
    #[error("Corrupt session file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by the guest session exchange.
///
/// Callers treat every variant as "cannot obtain credential" and re-invoke
/// [`crate::SessionManager::init_session`]; the split exists so logs can
/// tell an unreachable auth service apart from an explicit rejection.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The auth endpoint could not be reached or the request failed in
    /// transit.
    #[error("Auth endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The auth service answered, but not with a usable credential.
    #[error("Auth exchange rejected (status {status})")]
    Rejected {
        status: String,
        message: Option<String>,
    },

    /// The response body was not the expected JSON envelope.
    #[error("Malformed auth response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Persisting or reading the session pair failed.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}
