use notistress::{fatal, ConsoleDisplay, Harness, HarnessConfig};
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_thread_names(true))
        .init();

    let mut harness = Harness::new(HarnessConfig::default(), Arc::new(ConsoleDisplay::new()));
    if let Err(e) = harness.start() {
        fatal("starting harness", &e);
    }
    harness.run();
}
