//! PortSpec value object
//! Requested port (exact or inclusive range) and the transports to reserve

use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Which socket types must be free on the reserved port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
    /// Both UDP and TCP (a KDC serves both)
    #[default]
    Both,
}

impl Transport {
    pub fn includes_udp(&self) -> bool {
        matches!(self, Transport::Udp | Transport::Both)
    }

    pub fn includes_tcp(&self) -> bool {
        matches!(self, Transport::Tcp | Transport::Both)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
            Transport::Both => write!(f, "udp+tcp"),
        }
    }
}

/// A single port or an inclusive range of candidate ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSpec {
    Exact(u16),
    Range { low: u16, high: u16 },
}

impl PortSpec {
    /// Build an inclusive range, rejecting inverted bounds
    pub fn range(low: u16, high: u16) -> Result<Self> {
        if low > high {
            return Err(DomainError::InvalidConfiguration(format!(
                "port range {}-{} is inverted",
                low, high
            )));
        }
        if low == 0 {
            return Err(DomainError::InvalidConfiguration(
                "port range must not include port 0".to_string(),
            ));
        }
        Ok(PortSpec::Range { low, high })
    }

    /// Ports to try, in order
    pub fn candidates(&self) -> std::ops::RangeInclusive<u16> {
        match *self {
            PortSpec::Exact(port) => port..=port,
            PortSpec::Range { low, high } => low..=high,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, PortSpec::Exact(_))
    }
}

impl FromStr for PortSpec {
    type Err = DomainError;

    /// Accepts `"88"` or `"2222-3333"`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse_port = |p: &str| {
            p.trim().parse::<u16>().map_err(|_| {
                DomainError::InvalidConfiguration(format!("invalid port '{}'", p.trim()))
            })
        };

        match s.split_once('-') {
            Some((low, high)) => PortSpec::range(parse_port(low)?, parse_port(high)?),
            None => {
                let port = parse_port(s)?;
                if port == 0 {
                    return Err(DomainError::InvalidConfiguration(
                        "port must be non-zero".to_string(),
                    ));
                }
                Ok(PortSpec::Exact(port))
            }
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Exact(port) => write!(f, "{}", port),
            PortSpec::Range { low, high } => write!(f, "{}-{}", low, high),
        }
    }
}

/// What a daemon asks the port reservation for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRequest {
    pub host: IpAddr,
    pub ports: PortSpec,
    pub transport: Transport,
}

impl PortRequest {
    pub fn new(host: IpAddr, ports: PortSpec) -> Self {
        Self {
            host,
            ports,
            transport: Transport::default(),
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

impl fmt::Display for PortRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.ports, self.transport)
    }
}
