pub mod config;
pub mod error;
pub mod types;

pub use config::TransportConfig;
pub use error::{Error, Result};
pub use types::{PeerId, PeerInfo};
