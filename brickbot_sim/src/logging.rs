// brickbot_sim/src/logging.rs

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Bevy's render internals are noisy.
const DEFAULT_FILTER: &str = "info,wgpu_core=error,wgpu_hal=error,naga=warn";

/// Installs the process-wide subscriber: stderr, compact, filtered by
/// `RUST_LOG`. Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
