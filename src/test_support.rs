//! Shared test-only setup: a once-per-process tracing subscriber so test
//! failures carry log context instead of running silently.

#![cfg(test)]

use once_cell::sync::Lazy;

static INIT: Lazy<()> = Lazy::new(|| {
    let _ = tracing_log::LogTracer::init();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
});

pub(crate) fn init() {
    Lazy::force(&INIT);
}
