// nginx access-log ingestion: scanning, enrichment, batch and stream parsing.

pub mod conf;
pub mod parser;
pub mod runtime;
pub mod useragent;
