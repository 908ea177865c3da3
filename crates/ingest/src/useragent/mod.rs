//! User-agent classification: browser, operating system and device family
//! from a raw `User-Agent` header.

pub mod cache;
pub mod classifier;
pub mod model;
pub mod rules;

pub use cache::{CachedUserAgentParser, DEFAULT_UA_CACHE_SIZE};
pub use classifier::UserAgentClassifier;
pub use model::{DeviceType, UserAgentInfo};
