//! Plain configuration structs populated by an external loader (YAML/JSON
//! configuration loading and CLI flag parsing are out of scope for this
//! core). Builder methods over a `Default` base, plus a thin `from_env()`
//! convenience for local/manual runs — not a config parser.

use std::path::PathBuf;

/// Service-side identifiers the Workflow Service and Object Store need.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub domain: String,
    pub bucket: String,
    pub prefix: String,
}

impl ServiceConfig {
    pub fn new(domain: impl Into<String>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Reads `STEPWISE_DOMAIN`, `STEPWISE_BUCKET`, `STEPWISE_PREFIX`, falling
    /// back to empty strings for any that are unset.
    pub fn from_env() -> Self {
        Self {
            domain: std::env::var("STEPWISE_DOMAIN").unwrap_or_default(),
            bucket: std::env::var("STEPWISE_BUCKET").unwrap_or_default(),
            prefix: std::env::var("STEPWISE_PREFIX").unwrap_or_default(),
        }
    }
}

/// Configuration for an Actor process.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub queue: String,
    pub concurrency: usize,
    pub quiesce_path: Option<PathBuf>,
    pub command: String,
    pub nocopy: bool,
    pub local: bool,
    pub gzip: bool,
}

impl ActorConfig {
    pub fn new(queue: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            concurrency: 1,
            quiesce_path: None,
            command: command.into(),
            nocopy: false,
            local: false,
            gzip: true,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_quiesce_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.quiesce_path = Some(path.into());
        self
    }

    pub fn with_nocopy(mut self, nocopy: bool) -> Self {
        self.nocopy = nocopy;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// `--gzipless` negates this.
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Reads `STEPWISE_QUEUE`, `STEPWISE_CONCURRENCY`, `STEPWISE_QUIESCE_PATH`,
    /// `STEPWISE_COMMAND`, `STEPWISE_NOCOPY`, `STEPWISE_LOCAL`,
    /// `STEPWISE_GZIPLESS` for a local/manual run.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("STEPWISE_QUEUE").unwrap_or_default(),
            std::env::var("STEPWISE_COMMAND").unwrap_or_default(),
        );
        if let Ok(n) = std::env::var("STEPWISE_CONCURRENCY").and_then(|v| v.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config = config.with_concurrency(n);
        }
        if let Ok(path) = std::env::var("STEPWISE_QUIESCE_PATH") {
            config = config.with_quiesce_path(path);
        }
        config = config.with_nocopy(env_flag("STEPWISE_NOCOPY"));
        config = config.with_local(env_flag("STEPWISE_LOCAL"));
        config = config.with_gzip(!env_flag("STEPWISE_GZIPLESS"));
        config
    }
}

/// Configuration for a Decider process.
#[derive(Debug, Clone)]
pub struct DeciderConfig {
    pub queue: String,
    pub concurrency: usize,
    pub quiesce_path: Option<PathBuf>,
}

impl DeciderConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            concurrency: 1,
            quiesce_path: None,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_quiesce_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.quiesce_path = Some(path.into());
        self
    }

    /// Reads `STEPWISE_QUEUE`, `STEPWISE_CONCURRENCY`, `STEPWISE_QUIESCE_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var("STEPWISE_QUEUE").unwrap_or_default());
        if let Ok(n) = std::env::var("STEPWISE_CONCURRENCY").and_then(|v| v.parse().map_err(|_| std::env::VarError::NotPresent)) {
            config = config.with_concurrency(n);
        }
        if let Ok(path) = std::env::var("STEPWISE_QUIESCE_PATH") {
            config = config.with_quiesce_path(path);
        }
        config
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_config_builder_sets_fields() {
        let config = ActorConfig::new("q", "run.sh")
            .with_concurrency(4)
            .with_nocopy(true)
            .with_local(true)
            .with_gzip(false)
            .with_quiesce_path("/tmp/quiesce");

        assert_eq!(config.queue, "q");
        assert_eq!(config.command, "run.sh");
        assert_eq!(config.concurrency, 4);
        assert!(config.nocopy);
        assert!(config.local);
        assert!(!config.gzip);
        assert_eq!(config.quiesce_path, Some(PathBuf::from("/tmp/quiesce")));
    }

    #[test]
    fn concurrency_is_clamped_to_at_least_one() {
        let config = ActorConfig::new("q", "run.sh").with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn decider_config_builder_sets_fields() {
        let config = DeciderConfig::new("q").with_concurrency(2).with_quiesce_path("/tmp/q2");
        assert_eq!(config.queue, "q");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.quiesce_path, Some(PathBuf::from("/tmp/q2")));
    }
}
