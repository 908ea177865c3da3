use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

/// Device family inferred from a user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    Bot,
    #[serde(rename = "iPhone")]
    IPhone,
    #[serde(rename = "iPad")]
    IPad,
    #[serde(rename = "iPod")]
    IPod,
    #[serde(rename = "Game Console")]
    GameConsole,
    #[serde(rename = "Smart TV")]
    SmartTv,
    Tablet,
    Mobile,
    Wearable,
    IoT,
    #[serde(rename = "E-Reader")]
    EReader,
    #[default]
    Desktop,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Bot => "Bot",
            DeviceType::IPhone => "iPhone",
            DeviceType::IPad => "iPad",
            DeviceType::IPod => "iPod",
            DeviceType::GameConsole => "Game Console",
            DeviceType::SmartTv => "Smart TV",
            DeviceType::Tablet => "Tablet",
            DeviceType::Mobile => "Mobile",
            DeviceType::Wearable => "Wearable",
            DeviceType::IoT => "IoT",
            DeviceType::EReader => "E-Reader",
            DeviceType::Desktop => "Desktop",
        }
    }

    /// Collapse into Mobile / Tablet / Bot / Desktop.
    pub fn simple(&self) -> DeviceType {
        match self {
            DeviceType::IPhone | DeviceType::IPod | DeviceType::Mobile | DeviceType::Wearable => {
                DeviceType::Mobile
            }
            DeviceType::IPad | DeviceType::Tablet | DeviceType::EReader => DeviceType::Tablet,
            DeviceType::Bot => DeviceType::Bot,
            _ => DeviceType::Desktop,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a user-agent string says about the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: DeviceType,
}

impl UserAgentInfo {
    /// Result for an empty or `-` user agent.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_bot(&self) -> bool {
        self.device_type == DeviceType::Bot
    }

    pub fn is_mobile(&self) -> bool {
        self.device_type.simple() == DeviceType::Mobile
    }

    pub fn is_tablet(&self) -> bool {
        self.device_type.simple() == DeviceType::Tablet
    }
}

impl Default for UserAgentInfo {
    fn default() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            browser_version: String::new(),
            os: UNKNOWN.to_string(),
            os_version: String::new(),
            device_type: DeviceType::Desktop,
        }
    }
}
