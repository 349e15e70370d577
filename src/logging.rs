use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go
pub enum LogTarget<'a> {
    /// One-shot commands: stderr, quiet by default
    Stderr,
    /// TUI: a daily file under the directory, so the screen stays clean
    File(&'a Path),
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init_logging(target: LogTarget<'_>) {
    match target {
        LogTarget::Stderr => {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
        LogTarget::File(dir) => {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "kambio.log");
            let file_layer = fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .try_init();
        }
    }
}
