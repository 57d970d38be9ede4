use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::error::ConfigError;
use crate::domain::models::{SpecConfig, UserConfig};

/// Default locations, overridable by CLI flags (spec.md §6: "overridable by
/// CLI path").
pub const DEFAULT_USER_CONFIG_PATH: &str = "/etc/nodewatch/config.yaml";
pub const DEFAULT_SPEC_CONFIG_PATH: &str = "/etc/nodewatch/spec.yaml";

/// Loads and validates both configuration files with hierarchical merging,
/// the way `infrastructure/config/loader.rs` merges project config with
/// environment overrides: programmatic defaults, then the YAML file, then
/// `NODEWATCH_*` environment variables (highest priority).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the user config (operational knobs) from `path`, falling back
    /// to field defaults for anything the file omits, with `NODEWATCH_*`
    /// environment variables taking precedence over both.
    pub fn load_user_config(path: impl AsRef<Path>) -> Result<UserConfig, ConfigError> {
        let config: UserConfig = Figment::new()
            .merge(Serialized::defaults(UserConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("NODEWATCH_").split("__"))
            .extract()
            .map_err(|err| ConfigError::Parse(err.to_string()))?;

        Self::validate_user_config(&config)?;
        Ok(config)
    }

    /// Loads the declarative spec config (rule sets) from `path`.
    pub fn load_spec_config(path: impl AsRef<Path>) -> Result<SpecConfig, ConfigError> {
        let config: SpecConfig = Figment::new()
            .merge(Serialized::defaults(SpecConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|err| ConfigError::Parse(err.to_string()))?;

        Self::validate_spec_config(&config)?;
        Ok(config)
    }

    /// Per-component sanity checks that the typed deserialization doesn't
    /// already enforce: a zero `cache_size` would make the ring cache panic
    /// at construction, so it's rejected here instead (spec.md §7
    /// `ConfigError`: "Fatal at startup for that component; other
    /// components continue" — this crate surfaces the first offending
    /// component rather than scanning for all of them, since the caller
    /// logs and skips that component's registration either way).
    fn validate_user_config(config: &UserConfig) -> Result<(), ConfigError> {
        for (name, component) in &config.components {
            if component.cache_size == 0 {
                return Err(ConfigError::InvalidCacheSize { component: name.clone() });
            }
            if component.query_interval.0.is_zero() {
                return Err(ConfigError::InvalidQueryInterval {
                    component: name.clone(),
                    reason: "query_interval must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Event rule regexes are validated lazily by `RuntimeEventRule::compile`
    /// (invalid ones are logged and skipped, never fatal — spec.md §4.2), so
    /// this only checks indicator-style rule sets, whose shape a bad
    /// `duration_threshold` would otherwise silently default away.
    fn validate_spec_config(config: &SpecConfig) -> Result<(), ConfigError> {
        for (name, component) in &config.components {
            if component.is_indicator_style() && component.duration_threshold.is_none() {
                return Err(ConfigError::InvalidEventRule {
                    component: name.clone(),
                    rule: "duration_threshold".to_string(),
                    reason: "indicator-style components require a duration_threshold".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_user_config_with_defaults_for_missing_file() {
        let config = ConfigLoader::load_user_config("/nonexistent/path.yaml").unwrap();
        assert_eq!(config.metrics.port, 9400);
    }

    #[test]
    fn loads_user_config_overrides_from_yaml() {
        let file = write_temp_yaml(
            r"
dmesg:
  query_interval: 5s
  cache_size: 10
",
        );
        let config = ConfigLoader::load_user_config(file.path()).unwrap();
        assert_eq!(config.component("dmesg").cache_size, 10);
    }

    #[test]
    fn rejects_zero_cache_size() {
        let file = write_temp_yaml(
            r"
dmesg:
  cache_size: 0
",
        );
        let err = ConfigLoader::load_user_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCacheSize { .. }));
    }

    #[test]
    fn env_override_takes_precedence_over_yaml() {
        let file = write_temp_yaml(
            r"
metrics:
  port: 9400
",
        );
        unsafe {
            std::env::set_var("NODEWATCH_METRICS__PORT", "9999");
        }
        let config = ConfigLoader::load_user_config(file.path()).unwrap();
        unsafe {
            std::env::remove_var("NODEWATCH_METRICS__PORT");
        }
        assert_eq!(config.metrics.port, 9999);
    }

    #[test]
    fn indicator_style_spec_without_duration_threshold_is_rejected() {
        let yaml = r"
hang:
  check_items:
    sm:
      threshold: 95
      compare: high
";
        let file = write_temp_yaml(yaml);
        let err = ConfigLoader::load_spec_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEventRule { .. }));
    }
}
