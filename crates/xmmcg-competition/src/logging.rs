//! Tracing bootstrap.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use xmmcg_types::{CompetitionError, LoggingConfig, Result};

/// Turn a level or directive string into an `EnvFilter`.
///
/// A bare level (`"debug"`) applies to this workspace's crates only; a
/// string with `,` or `=` is taken as a full directive list.
pub fn filter_for(level: &str) -> Result<EnvFilter> {
    let level = level.trim();
    let spec = if level.contains(',') || level.contains('=') {
        level.to_string()
    } else {
        format!(
            "warn,xmmcg_types={level},xmmcg_ingress={level},xmmcg_allocation={level},\
             xmmcg_settlement={level},xmmcg_review={level},xmmcg_competition={level}"
        )
    };
    EnvFilter::try_new(&spec)
        .map_err(|e| CompetitionError::Configuration(format!("invalid log filter {spec:?}: {e}")))
}

/// Install the global subscriber.
///
/// # Errors
/// `Configuration` if the filter does not parse or a subscriber is already
/// installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = filter_for(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(false).with_current_span(false))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).compact())
            .try_init()
    };
    installed.map_err(|e| CompetitionError::Configuration(format!("tracing already set: {e}")))?;

    tracing::info!(
        level = %config.level,
        format = if config.json { "json" } else { "compact" },
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_and_directive_list() {
        assert!(filter_for("debug").is_ok());
        assert!(filter_for("info,xmmcg_allocation=trace").is_ok());
        assert!(filter_for("xmmcg_review=notalevel").is_err());
    }

    #[test]
    fn second_init_is_a_config_error() {
        let config = LoggingConfig::default();
        // The first call can lose to a subscriber another test installed.
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(matches!(second, Err(CompetitionError::Configuration(_))));
    }
}
