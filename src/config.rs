//! Runtime configuration, grounded in the teacher's
//! `server/clickhouse_client.rs` `read_env_var` pattern. Loaded from
//! environment variables (optionally populated from a `.env` file via
//! `dotenvy`) rather than the teacher's YAML/CLI/`validator` layer — this
//! crate has no user-defined schema catalog to validate against, so that
//! whole subsystem (`graph_catalog`) is dropped (see DESIGN.md).

use std::env;

/// Process-wide settings for opening stores and bounding query execution.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the SQLite database file, or `:memory:` for an ephemeral store.
    pub database_path: String,
    /// `busy_timeout` hint (milliseconds) applied to new connections.
    pub statement_timeout_ms: u32,
    /// Overrides [`crate::translator::vlp::DEFAULT_MAX_HOPS`] for unbounded
    /// variable-length relationship patterns (`-[*]-`) when set.
    pub max_recursion_depth: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            statement_timeout_ms: 5_000,
            max_recursion_depth: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, first attempting to
    /// populate them from a `.env` file in the working directory if present.
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            log::debug!("no .env file loaded: {err}");
        }

        let defaults = Self::default();
        Self {
            database_path: read_env_var("GRAPHCYPHER_DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            statement_timeout_ms: read_env_var("GRAPHCYPHER_STATEMENT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.statement_timeout_ms),
            max_recursion_depth: read_env_var("GRAPHCYPHER_MAX_RECURSION_DEPTH")
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn read_env_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_in_memory_store() {
        let config = Config::default();
        assert_eq!(config.database_path, ":memory:");
        assert!(config.max_recursion_depth.is_none());
    }
}
