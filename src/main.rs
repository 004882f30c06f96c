use anyhow::Result;
use tracing::info;

use solaris_uci::UciEngine;

fn main() -> Result<()> {
    // UCI communicates over stdout; all logging goes to stderr so it never
    // corrupts the protocol stream.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    info!("solaris starting");

    UciEngine::new().run()?;
    Ok(())
}
