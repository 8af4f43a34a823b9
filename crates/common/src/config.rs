use std::time::Duration;

/// Address format constants
pub mod addr {
    /// Hostname suffix for overlay service addresses
    pub const OVERLAY_SUFFIX: &str = "onion";

    /// Maximum length of a service identity (base32 characters)
    pub const MAX_SERVICE_ID_LEN: usize = 52;

    /// Host part of the zero-value listen-request marker
    pub const LISTEN_MARKER: &str = "listen";

    /// Path suffix selecting the framed sub-protocol
    pub const FRAMED_SUFFIX: &str = "ws";
}

/// Transport timing constants
pub mod transport {
    /// Sub-protocol handshake timeout
    pub const HANDSHAKE_TIMEOUT_SECS: u64 = 45;

    /// Hidden service registration timeout
    pub const SERVICE_SETUP_TIMEOUT_SECS: u64 = 60;

    /// Default per-dial timeout
    pub const DIAL_TIMEOUT_SECS: u64 = 30;
}

/// Quorum connection constants
pub mod quorum {
    /// Delay between successive attempt launches, so a freshly bootstrapped
    /// overlay session is not hit by every attempt at once
    pub const ATTEMPT_STAGGER_MS: u64 = 100;
}

/// Configuration for an overlay transport instance
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Deadline for a single raw dial
    pub dial_timeout: Duration,

    /// Deadline for the framed sub-protocol handshake
    pub handshake_timeout: Duration,

    /// Deadline for hidden service registration
    pub service_setup_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(transport::DIAL_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(transport::HANDSHAKE_TIMEOUT_SECS),
            service_setup_timeout: Duration::from_secs(transport::SERVICE_SETUP_TIMEOUT_SECS),
        }
    }
}
