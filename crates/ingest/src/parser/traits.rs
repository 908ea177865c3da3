use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use super::model::{AccessLogEntry, ParseError, ParseResult, StreamAbort};
pub use crate::useragent::{DeviceType, UserAgentInfo};

/// Classifies a user-agent string. Implementations must be deterministic.
#[cfg_attr(test, mockall::automock)]
pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> UserAgentInfo;

    fn is_bot(&self, user_agent: &str) -> bool {
        self.parse(user_agent).is_bot()
    }

    fn is_mobile(&self, user_agent: &str) -> bool {
        self.parse(user_agent).is_mobile()
    }

    fn is_tablet(&self, user_agent: &str) -> bool {
        self.parse(user_agent).is_tablet()
    }

    /// Collapse the device type into Mobile / Tablet / Bot / Desktop.
    fn simple_device_type(&self, user_agent: &str) -> DeviceType {
        self.parse(user_agent).device_type.simple()
    }
}

/// Geographic location returned by a [`GeoIpService`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: String,
    pub region_code: String,
    pub province: String,
    pub city: String,
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Geo lookup failed: {0}")]
    Lookup(String),
}

/// IP geolocation lookup. The database behind it is owned elsewhere; the
/// parser only calls `search` and treats any error as "no location".
#[cfg_attr(test, mockall::automock)]
pub trait GeoIpService: Send + Sync {
    fn search(&self, ip: &str) -> Result<Option<GeoLocation>, GeoError>;
}
