//! Subscriber setup for the command-line tool.

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber. `RUST_LOG` wins; otherwise `verbose` selects
/// debug and `level` is used as given.
pub fn init(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(level)
        }
    });

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
