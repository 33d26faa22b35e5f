//! Bundle Fetcher CLI application
//!
//! Command-line interface for maintaining an offline cache of content
//! bundles: enqueue assets from a manifest, run verified downloads, and
//! manage the capacity-bounded cache.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use bundle_fetcher::cli::{
    handle_cache, handle_cancel, handle_cap, handle_enqueue, handle_pause, handle_queue,
    handle_remove, handle_resume, handle_run, Cli, Commands,
};
use bundle_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("Bundle Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Enqueue(args) => handle_enqueue(&cli.global, args).await,
        Commands::Run => handle_run(&cli.global).await,
        Commands::Queue => handle_queue(&cli.global).await,
        Commands::Pause { ref id } => handle_pause(&cli.global, id).await,
        Commands::Resume { ref id } => handle_resume(&cli.global, id).await,
        Commands::Cancel { ref id } => handle_cancel(&cli.global, id).await,
        Commands::Remove { ref id } => handle_remove(&cli.global, id).await,
        Commands::Cap(args) => handle_cap(&cli.global, args.action).await,
        Commands::Cache(args) => handle_cache(&cli.global, args.action).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    // Create environment filter
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("bundle_fetcher={}", log_level).parse().unwrap());

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
