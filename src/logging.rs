//! tracing subscriber setup for the binary. Logs go to stderr so `query`
//! output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Filter directive for `level`; `debug` forces debug for this crate.
pub fn filter_directive(level: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { level };
    format!("gridrows={level},warn")
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
/// Calling it again is a no-op.
pub fn init(level: &str, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(level, debug)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("info", false), "gridrows=info,warn");
        assert_eq!(filter_directive("warn", true), "gridrows=debug,warn");
    }

    #[test]
    fn test_init_twice() {
        init("info", false);
        init("debug", true);
    }
}
