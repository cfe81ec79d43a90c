use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::link::constants::{DEFAULT_ENDPOINT, RECONNECT_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    AwaitingReconnect,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Connecting => "Connecting…",
            ConnectionState::Connected => "Connected",
            ConnectionState::AwaitingReconnect => "Waiting to reconnect…",
        };

        write!(f, "{}", result)
    }
}

/// One tilt reading in degrees. Negative values lean the other way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleReading(f64);

impl AngleReading {
    pub fn new(degrees: f64) -> Option<Self> {
        degrees.is_finite().then_some(AngleReading(degrees))
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for AngleReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    StateChange(ConnectionState),
    Angle(AngleReading),
}

/// Which local network interface the link binds its socket to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfacePolicy {
    /// Let the OS routing table decide.
    Any,
    /// First wireless interface, even when it has no internet route.
    Wifi,
    Named(String),
}

impl FromStr for InterfacePolicy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "any" => InterfacePolicy::Any,
            "wifi" => InterfacePolicy::Wifi,
            name => InterfacePolicy::Named(name.to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub endpoint: String,
    pub interface: InterfacePolicy,
    pub reconnect_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interface: InterfacePolicy::Wifi,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY),
        }
    }
}
