use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize a tracing subscriber for the engine.
///
/// Log level comes from `RUST_LOG`, defaulting to `info`. Audit records use
/// the `entsync::audit` target and can be filtered separately.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_safe_to_call_twice() {
        let _ = init();
        assert!(init().is_err());
        tracing::info!(target: "entsync::audit", "Added subscription for 'test' contract '1'");
    }
}
