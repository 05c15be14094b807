//! Structured logging setup. Mirrors the startup-time subscriber
//! initialization pattern, toggling record format on `JSON_LOGS`.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init(json_logs: bool) {
    INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        if json_logs {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_env_filter(env_filter)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_env_filter(env_filter)
                .init();
        }
    });
}

/// Tag applied to the service span so cancellation/executor events can be
/// grouped by deployment in any downstream log sink.
pub fn service_name(service_suffix: &str) -> String {
    format!("chartengine{}", service_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_appends_suffix() {
        assert_eq!(service_name(""), "chartengine");
        assert_eq!(service_name("-staging"), "chartengine-staging");
    }
}
