//! Assembler configuration.
//!
//! Settings can be built in code, read from `WEFT_DI_*` environment variables,
//! or (with the `config` feature) deserialized from JSON.

use std::env;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::graph::OverridePolicy;
use crate::internal::DEFAULT_MAX_DEPTH;

/// Environment variable selecting the [`OverridePolicy`].
pub const ENV_OVERRIDE_POLICY: &str = "WEFT_DI_OVERRIDE_POLICY";
/// Environment variable marking the build as running under test.
pub const ENV_TESTING: &str = "WEFT_DI_TESTING";
/// Environment variable overriding the maximum resolution depth.
pub const ENV_MAX_RESOLUTION_DEPTH: &str = "WEFT_DI_MAX_RESOLUTION_DEPTH";
/// Environment variable turning duplicate registrations into assembly errors.
pub const ENV_FAIL_ON_DUPLICATES: &str = "WEFT_DI_FAIL_ON_DUPLICATES";

/// Settings consumed by the [`ModuleAssembler`](crate::ModuleAssembler).
///
/// # Examples
///
/// ```
/// use weft_di::{AssemblerConfig, OverridePolicy};
///
/// let config = AssemblerConfig::default()
///     .with_override_policy(OverridePolicy::Always)
///     .with_max_resolution_depth(64);
///
/// assert!(config.overrides_enabled());
/// assert_eq!(config.max_resolution_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AssemblerConfig {
    /// When default module overrides apply
    pub override_policy: OverridePolicy,
    /// Whether the assembly runs under test, for [`OverridePolicy::Contextual`]
    pub testing: bool,
    /// Nested resolutions allowed before a dependency cycle is assumed
    pub max_resolution_depth: usize,
    /// Fail assembly when a module registers a key twice
    pub fail_on_duplicates: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            override_policy: OverridePolicy::Contextual,
            testing: false,
            max_resolution_depth: DEFAULT_MAX_DEPTH,
            fail_on_duplicates: false,
        }
    }
}

impl AssemblerConfig {
    pub fn with_override_policy(mut self, policy: OverridePolicy) -> Self {
        self.override_policy = policy;
        self
    }

    pub fn with_testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn with_fail_on_duplicates(mut self, fail: bool) -> Self {
        self.fail_on_duplicates = fail;
        self
    }

    /// Checks the settings that cannot be expressed in the field types.
    pub fn validate(&self) -> DiResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(DiError::InvalidConfig("max_resolution_depth must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether default overrides apply under this configuration.
    pub fn overrides_enabled(&self) -> bool {
        self.override_policy.allows_overrides(self.testing)
    }

    /// Load configuration from `WEFT_DI_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> DiResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{AssemblerConfig, OverridePolicy};
    ///
    /// let config = AssemblerConfig::from_lookup(|name| match name {
    ///     "WEFT_DI_OVERRIDE_POLICY" => Some("never".to_string()),
    ///     "WEFT_DI_TESTING" => Some("1".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.override_policy, OverridePolicy::Never);
    /// assert!(config.testing);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_OVERRIDE_POLICY) {
            config.override_policy = value.parse()?;
        }
        if let Some(value) = lookup(ENV_TESTING) {
            config.testing = parse_bool(ENV_TESTING, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_RESOLUTION_DEPTH) {
            config.max_resolution_depth = value.trim().parse().map_err(|_| {
                DiError::InvalidConfig(format!("{} must be a positive integer, got `{}`", ENV_MAX_RESOLUTION_DEPTH, value))
            })?;
        }
        if let Some(value) = lookup(ENV_FAIL_ON_DUPLICATES) {
            config.fail_on_duplicates = parse_bool(ENV_FAIL_ON_DUPLICATES, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DiError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::InvalidConfig(e.to_string()))
    }
}

fn parse_bool(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(DiError::InvalidConfig(format!("{} must be a boolean, got `{}`", name, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = AssemblerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AssemblerConfig::default());
        assert!(!config.overrides_enabled());
    }

    #[test]
    fn reads_every_variable() {
        let config = AssemblerConfig::from_lookup(lookup(&[
            (ENV_OVERRIDE_POLICY, "Always"),
            (ENV_TESTING, "false"),
            (ENV_MAX_RESOLUTION_DEPTH, "32"),
            (ENV_FAIL_ON_DUPLICATES, "yes"),
        ]))
        .unwrap();
        assert_eq!(config.override_policy, OverridePolicy::Always);
        assert_eq!(config.max_resolution_depth, 32);
        assert!(config.fail_on_duplicates);
        assert!(config.overrides_enabled());
    }

    #[test]
    fn contextual_policy_follows_testing_flag() {
        let config = AssemblerConfig::from_lookup(lookup(&[(ENV_TESTING, "on")])).unwrap();
        assert!(config.overrides_enabled());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            AssemblerConfig::from_lookup(lookup(&[(ENV_OVERRIDE_POLICY, "sometimes")])),
            Err(DiError::InvalidConfig(_))
        ));
        assert!(AssemblerConfig::from_lookup(lookup(&[(ENV_MAX_RESOLUTION_DEPTH, "0")])).is_err());
        assert!(AssemblerConfig::from_lookup(lookup(&[(ENV_TESTING, "maybe")])).is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_fills_missing_fields() {
        let config = AssemblerConfig::from_json_str(r#"{"override_policy":"never","testing":true}"#).unwrap();
        assert_eq!(config.override_policy, OverridePolicy::Never);
        assert!(config.testing);
        assert_eq!(config.max_resolution_depth, DEFAULT_MAX_DEPTH);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_rejects_zero_depth() {
        assert!(matches!(
            AssemblerConfig::from_json_str(r#"{"max_resolution_depth":0}"#),
            Err(DiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_depth_fails_validation() {
        let config = AssemblerConfig::default().with_max_resolution_depth(0);
        assert!(matches!(config.validate(), Err(DiError::InvalidConfig(_))));
        assert!(AssemblerConfig::default().validate().is_ok());
    }
}
