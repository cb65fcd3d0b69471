//! Log output setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a stderr `fmt` subscriber filtered by `filter`.
///
/// `filter` uses `EnvFilter` directive syntax (`warn`, `steep=debug`, ...);
/// an unparsable filter falls back to `warn`. Calling this more than once
/// keeps the first subscriber.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init("steep=debug");
        init("not a [valid filter");
        tracing::debug!("logging initialised");
    }
}
