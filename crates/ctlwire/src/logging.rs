use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Crates whose events follow `--log-level`; everything else stays at warn.
const CTLWIRE_TARGETS: [&str; 4] = [
    "ctlwire",
    "ctlwire_channel",
    "ctlwire_frame",
    "ctlwire_transport",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn targets(level: LogLevel) -> Targets {
    let level = LevelFilter::from(level);
    CTLWIRE_TARGETS.iter().fold(
        Targets::new().with_default(level.min(LevelFilter::WARN)),
        |targets, target| targets.with_target(*target, level),
    )
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = targets(level);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter))
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn own_crates_follow_the_requested_level() {
        let filter = targets(LogLevel::Debug);
        assert!(filter.would_enable("ctlwire_channel::channel", &Level::DEBUG));
        assert!(!filter.would_enable("ctlwire_frame::framed", &Level::TRACE));
    }

    #[test]
    fn other_crates_stay_quiet() {
        let filter = targets(LogLevel::Trace);
        assert!(!filter.would_enable("mio::poll", &Level::INFO));
        assert!(filter.would_enable("mio::poll", &Level::WARN));

        let filter = targets(LogLevel::Error);
        assert!(!filter.would_enable("mio::poll", &Level::WARN));
    }
}
