use tracing_subscriber::{fmt, EnvFilter};

/// Sends diagnostics to stderr so stdout stays clean for tokens and reports.
///
/// `RUST_LOG` wins when set; otherwise `--debug` enables this crate's debug
/// output and everything else stays at `warn`.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("warn,kubi=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init();
}
