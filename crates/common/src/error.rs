use thiserror::Error;

/// Common error types for onionmesh
///
/// Per-attempt errors are carried as values across task boundaries and
/// aggregated by the quorum connector; `QuorumUnreachable` and `Cancelled`
/// render every recorded cause, not just the triggering one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address: {0}")]
    AddressFormatInvalid(String),

    #[error("overlay session bootstrap failed: {0}")]
    SessionInitFailed(anyhow::Error),

    #[error("dial failed: {0}")]
    DialFailed(String),

    #[error("connection upgrade failed: {0}")]
    UpgradeFailed(String),

    #[error("hidden service registration failed: {0}")]
    ServiceRegistrationFailed(String),

    #[error("listener setup failed: {0}")]
    ListenerSetupFailed(String),

    #[error("listener closed")]
    ListenerClosed,

    #[error("quorum unreachable, {} attempts failed: [{}]", causes.len(), render_causes(causes))]
    QuorumUnreachable { causes: Vec<Error> },

    #[error("cancelled with {} failures so far: [{}]", causes.len(), render_causes(causes))]
    Cancelled { causes: Vec<Error> },
}

/// Result type for onionmesh operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::AddressFormatInvalid(msg.into())
    }

    pub fn dial_failed(msg: impl Into<String>) -> Self {
        Self::DialFailed(msg.into())
    }

    pub fn upgrade_failed(msg: impl Into<String>) -> Self {
        Self::UpgradeFailed(msg.into())
    }

    pub fn listener_setup(msg: impl Into<String>) -> Self {
        Self::ListenerSetupFailed(msg.into())
    }
}

fn render_causes(causes: &[Error]) -> String {
    causes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
