//! otelblast CLI entry point.

use otelblast_lib::cli::{self, Cli};
use otelblast_lib::core::Result;

// The replay loop clones protobuf graphs at high rates; mimalloc keeps the
// allocator out of the profile.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
