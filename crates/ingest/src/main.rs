use std::path::PathBuf;

use ingest::runtime::{boot, run};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let (parser, classifier) = boot::boot()?;
    run::run(parser, classifier, path.as_deref()).await
}
