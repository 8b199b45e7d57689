//! Tracing setup for the CLI.
//!
//! Library code logs through `tracing`; this picks the level and format.
//! With `--timing`, every `#[instrument]`ed span logs its duration when it
//! closes.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::cli::LogFormat;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` still overrides the default level.
pub fn init_tracing(verbose: bool, timing: bool, format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbose, timing).into())
        .from_env_lossy();

    let span_events = if timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_target(verbose)
        .with_level(true)
        .with_span_events(span_events)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json())
            .with(filter)
            .init(),
    }
}

fn default_level(verbose: bool, timing: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else if timing {
        // Span close events are logged at INFO.
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The subscriber itself is process-global, so only the level choice is tested.
    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false, false), LevelFilter::WARN);
        assert_eq!(default_level(false, true), LevelFilter::INFO);
        assert_eq!(default_level(true, true), LevelFilter::DEBUG);
    }
}
