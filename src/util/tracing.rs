use tracing::Level;
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Initializes the `tracing` logging framework.
///
/// Log output goes to stderr so that it does not mix with the measurements
/// printed to stdout in dry-run mode. The default level is `INFO`, or `DEBUG`
/// if `verbose` is set, and can be overridden with the
/// [`RUST_LOG`](tracing_subscriber::filter::EnvFilter) environment variable.
pub fn init(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes the `tracing` logging framework for usage in tests.
pub fn init_for_test() -> DefaultGuard {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .without_time()
        .with_test_writer()
        .finish();

    tracing::subscriber::set_default(subscriber)
}
