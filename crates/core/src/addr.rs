//! Structured overlay addresses and the onion address codec.
//!
//! Addresses are ordered sequences of (protocol, value) segments, rendered
//! as text in the form `<identity>.onion:<port>[/ws]`. Listen requests use
//! the zero-value marker `listen.onion`. Remote endpoints reported by an
//! accept source may also be plain `ip:port` pairs.

use onionmesh_common::config::addr as addr_cfg;
use onionmesh_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Protocol tag for one address segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Overlay hidden-service identity
    OnionService,

    /// TCP port
    Tcp,

    /// Plain IP host (remote endpoints only)
    Ip,

    /// Framed sub-protocol selector
    Ws,

    /// Listen-request marker
    OnionListen,
}

impl Protocol {
    pub fn tag(&self) -> &'static str {
        match self {
            Protocol::OnionService => "onion",
            Protocol::Tcp => "tcp",
            Protocol::Ip => "ip",
            Protocol::Ws => "ws",
            Protocol::OnionListen => "onion-listen",
        }
    }
}

/// One tagged segment of a structured address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub protocol: Protocol,
    pub value: String,
}

impl Segment {
    pub fn new(protocol: Protocol, value: impl Into<String>) -> Self {
        Self {
            protocol,
            value: value.into(),
        }
    }
}

/// A protocol-tagged, ordered address.
///
/// Immutable once constructed; two addresses are equal iff their segment
/// sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StructuredAddr {
    segments: Vec<Segment>,
}

impl StructuredAddr {
    /// The empty address (an unnamed local endpoint)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Address of a hidden service: identity + port segments
    pub fn onion_service(service_id: impl Into<String>, port: u16) -> Self {
        Self::from_segments(vec![
            Segment::new(Protocol::OnionService, service_id),
            Segment::new(Protocol::Tcp, port.to_string()),
        ])
    }

    /// The zero-value listen-request marker
    pub fn listen_marker() -> Self {
        Self::from_segments(vec![Segment::new(Protocol::OnionListen, "")])
    }

    /// Append the framed sub-protocol selector
    pub fn with_framing(mut self) -> Self {
        self.segments.push(Segment::new(Protocol::Ws, ""));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for StructuredAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut rest: &[Segment] = &self.segments;

        match rest {
            [Segment {
                protocol: Protocol::OnionService,
                value: id,
            }, Segment {
                protocol: Protocol::Tcp,
                value: port,
            }, tail @ ..] => {
                out = format!("{id}.{}:{port}", addr_cfg::OVERLAY_SUFFIX);
                rest = tail;
            }
            [Segment {
                protocol: Protocol::Ip,
                value: ip,
            }, Segment {
                protocol: Protocol::Tcp,
                value: port,
            }, tail @ ..] => {
                out = format!("{ip}:{port}");
                rest = tail;
            }
            [Segment {
                protocol: Protocol::OnionListen,
                value,
            }, tail @ ..] => {
                out = format!("{}.{}", addr_cfg::LISTEN_MARKER, addr_cfg::OVERLAY_SUFFIX);
                if !value.is_empty() {
                    out.push('/');
                    out.push_str(value);
                }
                rest = tail;
            }
            _ => {}
        }

        for seg in rest {
            out.push('/');
            out.push_str(seg.protocol.tag());
            if !seg.value.is_empty() {
                out.push('/');
                out.push_str(&seg.value);
            }
        }

        write!(f, "{out}")
    }
}

/// Address text parse errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddrError {
    #[error("empty address")]
    Empty,

    #[error("missing port")]
    MissingPort,

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("invalid service identity '{0}'")]
    InvalidServiceId(String),

    #[error("unrecognized host '{0}'")]
    UnrecognizedHost(String),

    #[error("unsupported segment '{0}'")]
    UnsupportedSegment(String),
}

impl From<AddrError> for Error {
    fn from(err: AddrError) -> Self {
        Error::AddressFormatInvalid(err.to_string())
    }
}

/// True iff `id` is a plausible overlay service identity: 1 to 52
/// characters over the lowercase base32 alphabet.
fn is_valid_service_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= addr_cfg::MAX_SERVICE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c))
}

fn parse_port(port: &str) -> std::result::Result<u16, AddrError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(AddrError::InvalidPort(port.to_string())),
        Ok(p) => Ok(p),
    }
}

impl FromStr for StructuredAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddrError::Empty);
        }

        let (head, path) = match s.split_once('/') {
            Some((head, path)) => (head, Some(path)),
            None => (s, None),
        };

        let marker_host = format!("{}.{}", addr_cfg::LISTEN_MARKER, addr_cfg::OVERLAY_SUFFIX);
        if head == marker_host {
            // A valued marker still parses; the codec rejects it at decode
            // time and listen() refuses it before any side effect.
            let value = path.unwrap_or("");
            if value.contains('/') {
                return Err(AddrError::UnsupportedSegment(value.to_string()));
            }
            return Ok(Self::from_segments(vec![Segment::new(
                Protocol::OnionListen,
                value,
            )]));
        }

        let (host, port) = head.rsplit_once(':').ok_or(AddrError::MissingPort)?;
        let port = parse_port(port)?;

        let onion_suffix = format!(".{}", addr_cfg::OVERLAY_SUFFIX);
        let mut segments = if let Some(id) = host.strip_suffix(&onion_suffix) {
            if !is_valid_service_id(id) {
                return Err(AddrError::InvalidServiceId(id.to_string()));
            }
            vec![
                Segment::new(Protocol::OnionService, id),
                Segment::new(Protocol::Tcp, port.to_string()),
            ]
        } else if host.parse::<IpAddr>().is_ok() {
            vec![
                Segment::new(Protocol::Ip, host),
                Segment::new(Protocol::Tcp, port.to_string()),
            ]
        } else {
            return Err(AddrError::UnrecognizedHost(host.to_string()));
        };

        if let Some(path) = path {
            for part in path.split('/') {
                if part != addr_cfg::FRAMED_SUFFIX {
                    return Err(AddrError::UnsupportedSegment(part.to_string()));
                }
                segments.push(Segment::new(Protocol::Ws, ""));
            }
        }

        Ok(Self::from_segments(segments))
    }
}

/// Translates between structured addresses and (service identity, port)
/// pairs.
///
/// An explicit codec value is injected into the transport and listener at
/// construction; there is no process-wide default instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnionAddrCodec;

impl OnionAddrCodec {
    pub fn new() -> Self {
        Self
    }

    /// Extract the (service identity, port) pair from `addr`.
    ///
    /// Fails unless the address is exactly an identity segment followed by
    /// a port segment, optionally followed by one framed-sub-protocol
    /// segment. Listen markers, plain IP endpoints, and any extraneous
    /// segments are format errors.
    pub fn decode(&self, addr: &StructuredAddr) -> Result<(String, u16)> {
        let (id, port, tail) = match addr.segments() {
            [Segment {
                protocol: Protocol::OnionService,
                value: id,
            }, Segment {
                protocol: Protocol::Tcp,
                value: port,
            }, tail @ ..] => (id, port, tail),
            [Segment {
                protocol: Protocol::OnionListen,
                value,
            }, ..] if !value.is_empty() => {
                return Err(Error::invalid_address(format!(
                    "listen marker must carry no value, got '{value}'"
                )));
            }
            _ => {
                return Err(Error::invalid_address(format!(
                    "expected overlay identity and port segments in '{addr}'"
                )));
            }
        };

        match tail {
            []
            | [Segment {
                protocol: Protocol::Ws,
                ..
            }] => {}
            _ => {
                return Err(Error::invalid_address(format!(
                    "extraneous segments in '{addr}'"
                )));
            }
        }

        if !is_valid_service_id(id) {
            return Err(Error::invalid_address(format!(
                "invalid service identity '{id}'"
            )));
        }
        let port = parse_port(port).map_err(Error::from)?;

        Ok((id.clone(), port))
    }

    /// Canonical text form of a service address: `<identity>.onion:<port>`.
    ///
    /// Deterministic; callers may append the framed suffix.
    pub fn encode(&self, service_id: &str, port: u16) -> String {
        format!("{service_id}.{}:{port}", addr_cfg::OVERLAY_SUFFIX)
    }

    /// Hostname form of a service identity: `<identity>.onion`
    pub fn hostname(&self, service_id: &str) -> String {
        format!("{service_id}.{}", addr_cfg::OVERLAY_SUFFIX)
    }

    /// True iff `addr` is the bare zero-value listen-request marker
    pub fn is_listen_marker(&self, addr: &StructuredAddr) -> bool {
        matches!(
            addr.segments(),
            [Segment {
                protocol: Protocol::OnionListen,
                value,
            }] if value.is_empty()
        )
    }

    /// Build a validated structured address for a service, optionally with
    /// the framed sub-protocol selected.
    pub fn service_addr(
        &self,
        service_id: &str,
        port: u16,
        framed: bool,
    ) -> Result<StructuredAddr> {
        let mut text = self.encode(service_id, port);
        if framed {
            text.push('/');
            text.push_str(addr_cfg::FRAMED_SUFFIX);
        }
        Ok(text.parse::<StructuredAddr>()?)
    }
}
