use std::backtrace::{Backtrace, BacktraceStatus};
use std::env;
use std::panic::PanicHookInfo;

use pubsink_core::SinkWriter;
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

/// Set to `true` for human readable, debug level console output.
const ENV_DEBUG: &str = "PUBSINK_DEBUG";

/// Panic hook logging the panic as one `tracing` error event instead of the multi-line report
/// on stderr, so that it ends up wherever the rest of the logs go.
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    // only captured when RUST_BACKTRACE or RUST_LIB_BACKTRACE is set
    let backtrace = Backtrace::capture();
    let payload = panic_info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<String>()
                .map(String::as_str)
        });

    match (panic_info.location(), payload) {
        (Some(location), Some(payload)) if backtrace.status() != BacktraceStatus::Captured => {
            tracing::error!(
                "{}:{}:{}: {}",
                location.file(),
                location.line(),
                location.column(),
                payload,
            );
        }
        _ => tracing::error!("{}\n{}", panic_info, backtrace),
    }
}

fn debug_mode() -> bool {
    env::var(ENV_DEBUG).is_ok_and(|v| v.eq_ignore_ascii_case("true"))
}

/// RUST_LOG overrides the default level, `info` (or `debug` in debug mode).
fn env_filter(debug_mode: bool) -> EnvFilter {
    let default_directive = if debug_mode { Level::DEBUG } else { Level::INFO };
    EnvFilter::builder()
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}

fn console_layer<S>(debug_mode: bool) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if debug_mode {
        // Text format
        fmt::layer().boxed()
    } else {
        // JSON format, flattened
        fmt::layer()
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed()
    }
}

/// Install the process-wide subscriber, logging to the console only.
pub fn register() {
    let debug_mode = debug_mode();
    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(console_layer(debug_mode))
        .init();

    std::panic::set_hook(Box::new(report_panic));
}

/// A subscriber logging to the console and, as flattened JSON records, to a sink. Meant to be
/// scoped to the code whose records should be published, with `dispatcher::with_default` or
/// `WithSubscriber::with_subscriber`.
pub fn with_sink(writer: SinkWriter) -> Dispatch {
    let debug_mode = debug_mode();
    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(console_layer(debug_mode))
        .with(
            fmt::layer()
                .with_ansi(false)
                .json()
                .flatten_event(true)
                .with_writer(writer),
        )
        .into()
}
