use tracing_subscriber::EnvFilter;

/// Pick the log filter: an explicit filter wins, then the debug flag.
pub fn filter_directive(log_level: Option<&str>, debug: bool) -> String {
    match log_level.map(str::trim).filter(|l| !l.is_empty()) {
        Some(level) => level.to_string(),
        None if debug => "debug".to_string(),
        None => "info".to_string(),
    }
}

/// Install the global subscriber. Logs always go to stderr; stdout belongs
/// to the stdio transport.
pub fn init_logging(log_level: Option<&str>, debug: bool) {
    let directive = filter_directive(log_level, debug);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
