//! Boot: logging init, config load, parser construction.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::ParserConfig;
use crate::parser::LogParser;
use crate::useragent::{CachedUserAgentParser, UserAgentClassifier};

pub type SharedClassifier = Arc<CachedUserAgentParser<UserAgentClassifier>>;

/// Initialise the tracing / logging subsystem.
///
/// Logs go to stderr; stdout is reserved for parsed entries.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config and build the parser with a cached user-agent classifier.
///
/// The classifier handle is returned as well so its cache can be reported.
pub fn boot() -> Result<(Arc<LogParser>, SharedClassifier), Box<dyn std::error::Error>> {
    info!("Starting ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = ParserConfig::load()?;
    build(config)
}

/// Build the parser for an already loaded configuration.
pub fn build(
    config: ParserConfig,
) -> Result<(Arc<LogParser>, SharedClassifier), Box<dyn std::error::Error>> {
    info!(
        "Parser: batch_size={}, workers={}, strict={}, max_line_length={}",
        config.batch_size,
        if config.worker_count == 0 {
            "auto".to_string()
        } else {
            config.worker_count.to_string()
        },
        config.strict_mode,
        config.max_line_length
    );
    info!(
        "Enrichment: ua={}, geo={} (no geo service configured)",
        config.enable_ua, config.enable_geo
    );

    let classifier = Arc::new(CachedUserAgentParser::new(
        UserAgentClassifier::new(),
        config.ua_cache_size,
    ));
    let parser = LogParser::new(config, classifier.clone(), None)?;
    info!("Registered formats: {:?}", parser.formats().names());

    Ok((Arc::new(parser), classifier))
}
