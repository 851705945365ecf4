//! Process-wide configuration
//!
//! Settings are read from `TFF_*` environment variables once, the first time
//! [`FactoryConfig::global`] is called. Individual calls can still override
//! them through [`FactoryOptions`](crate::FactoryOptions).

use std::sync::OnceLock;

use tracing::warn;

/// Reads prefixed environment variables.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Full variable name for `key`, e.g. `TFF_SKIP_DESTROY`.
    pub fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    /// Load a yes/no flag, falling back to `default` when unset or unrecognized.
    pub fn load_flag(&self, key: &str, default: bool) -> bool {
        let name = self.var_name(key);
        match std::env::var(&name) {
            Ok(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!(variable = %name, value = %raw, "unrecognized flag value, using default");
                default
            }),
            Err(_) => default,
        }
    }
}

/// Parse a yes/no flag: `y|yes|true|1|on` or `n|no|false|0|off`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Some(true),
        "n" | "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration settings for factories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactoryConfig {
    /// Skip destroy callbacks unless a call asks otherwise (default: false)
    pub skip_destroy: bool,
}

impl FactoryConfig {
    const ENV_PREFIX: &'static str = "TFF";
    const DEFAULT_SKIP_DESTROY: bool = false;

    /// Read the configuration from the environment
    pub fn new() -> Self {
        let loader = EnvLoader::new(Self::ENV_PREFIX);
        Self {
            skip_destroy: loader.load_flag("SKIP_DESTROY", Self::DEFAULT_SKIP_DESTROY),
        }
    }

    /// Get the global configuration instance
    pub fn global() -> &'static Self {
        static CONFIG: OnceLock<FactoryConfig> = OnceLock::new();
        CONFIG.get_or_init(FactoryConfig::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_factory_test_utils::EnvGuard;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    #[case("y", Some(true))]
    #[case("YES", Some(true))]
    #[case(" true ", Some(true))]
    #[case("1", Some(true))]
    #[case("On", Some(true))]
    #[case("n", Some(false))]
    #[case("No", Some(false))]
    #[case("false", Some(false))]
    #[case("0", Some(false))]
    #[case("OFF", Some(false))]
    #[case("", None)]
    #[case("maybe", None)]
    fn test_parse_flag(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_flag(raw), expected);
    }

    #[test]
    fn test_default_config() {
        assert!(!FactoryConfig::default().skip_destroy);
    }

    #[test]
    #[serial]
    fn test_skip_destroy_from_env() {
        let _env = EnvGuard::set("TFF_SKIP_DESTROY", "yes");
        assert!(FactoryConfig::new().skip_destroy);
    }

    #[test]
    #[serial]
    fn test_skip_destroy_unset() {
        let _env = EnvGuard::remove("TFF_SKIP_DESTROY");
        assert!(!FactoryConfig::new().skip_destroy);
    }

    #[test]
    #[serial]
    fn test_unrecognized_value_keeps_default() {
        let _env = EnvGuard::set("TFF_SKIP_DESTROY", "sometimes");
        assert!(!FactoryConfig::new().skip_destroy);
    }

    #[test]
    fn test_var_name_uses_prefix() {
        assert_eq!(EnvLoader::new("TFF").var_name("SKIP_DESTROY"), "TFF_SKIP_DESTROY");
    }
}
