//! Global `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "DIASIGHT_LOG";

/// Install the global subscriber.
///
/// `DIASIGHT_LOG` wins over `filter` when set. Returns false if a
/// subscriber was already installed, so calling it twice is harmless.
pub fn init_logging(filter: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // whichever call runs first in this process wins
        let _ = init_logging("debug", false);
        assert!(!init_logging("info", true));
    }
}
