//! Orchestrator configuration.
//!
//! Defaults are compiled in; [`OrchestratorConfig::from_env`] overlays
//! `COLLOQUY_*` environment variables (loading a `.env` file first when one
//! exists) so deployments can tune limits without code changes.

use std::time::Duration;

use crate::executor::DEFAULT_STEP_LIMIT;
use crate::router::RouterConfig;
use crate::streaming::BufferConfig;

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Ceiling on execution steps per turn.
    pub step_limit: u64,
    /// How many stored entries are loaded as turn context.
    pub history_window: usize,
    /// Entry count past which a room gets summarized after a turn.
    pub summary_threshold: usize,
    /// Entries kept verbatim when older history folds into the summary.
    pub summary_keep_recent: usize,
    /// Routing policy knobs.
    pub router: RouterConfig,
    /// Stream buffer flush thresholds.
    pub buffer: BufferConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            history_window: 20,
            summary_threshold: 10,
            summary_keep_recent: 4,
            router: RouterConfig::default(),
            buffer: BufferConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Builds a config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            step_limit: env_parse("COLLOQUY_STEP_LIMIT", defaults.step_limit),
            history_window: env_parse("COLLOQUY_HISTORY_WINDOW", defaults.history_window),
            summary_threshold: env_parse("COLLOQUY_SUMMARY_THRESHOLD", defaults.summary_threshold),
            summary_keep_recent: env_parse(
                "COLLOQUY_SUMMARY_KEEP_RECENT",
                defaults.summary_keep_recent,
            ),
            router: defaults.router,
            buffer: BufferConfig {
                max_interval: Duration::from_millis(env_parse(
                    "COLLOQUY_BUFFER_INTERVAL_MS",
                    defaults.buffer.max_interval.as_millis() as u64,
                )),
                max_chars: env_parse("COLLOQUY_BUFFER_MAX_CHARS", defaults.buffer.max_chars),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.step_limit, 20);
        assert_eq!(config.history_window, 20);
        assert_eq!(config.summary_threshold, 10);
        assert_eq!(config.summary_keep_recent, 4);
        assert_eq!(config.buffer.max_chars, 50);
        assert_eq!(config.buffer.max_interval, Duration::from_millis(500));
    }
}
