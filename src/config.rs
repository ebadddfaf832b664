// Configuration module for srclines
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection pool size (SRCLINES_POOL_SIZE)
    pub pool_size: u32,

    /// Database connection pool minimum idle connections (SRCLINES_POOL_MIN_IDLE)
    pub pool_min_idle: u32,

    /// Methods slower than this are logged (SRCLINES_SLOW_QUERY_MS)
    pub slow_query_ms: u64,

    /// Upper bound on lines returned by one `lines` call, 0 disables (SRCLINES_MAX_LINES)
    pub max_lines: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 10,
            pool_min_idle: 2,
            slow_query_ms: 100,
            max_lines: 0,
        }
    }
}

fn override_from_env<T>(name: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Ok(val) = env::var(name) else {
        return;
    };
    match val.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => log::warn!("Invalid {name} value: {val}, using default: {slot}"),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        override_from_env("SRCLINES_POOL_SIZE", &mut config.pool_size);
        override_from_env("SRCLINES_POOL_MIN_IDLE", &mut config.pool_min_idle);
        override_from_env("SRCLINES_SLOW_QUERY_MS", &mut config.slow_query_ms);
        override_from_env("SRCLINES_MAX_LINES", &mut config.max_lines);
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.pool_min_idle, 2);
        assert_eq!(config.slow_query_ms, 100);
        assert_eq!(config.max_lines, 0);
    }

    #[test]
    fn test_invalid_override_keeps_default() {
        let mut value: u32 = 7;
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("SRCLINES_TEST_BOGUS_U32", "not-a-number") };
        override_from_env("SRCLINES_TEST_BOGUS_U32", &mut value);
        assert_eq!(value, 7);

        unsafe { env::set_var("SRCLINES_TEST_BOGUS_U32", "42") };
        override_from_env("SRCLINES_TEST_BOGUS_U32", &mut value);
        assert_eq!(value, 42);
        unsafe { env::remove_var("SRCLINES_TEST_BOGUS_U32") };
    }
}
