//! Configuration
//!
//! A TOML file carries lifecycle switches, the log filter and declarative
//! handler registrations. Registrations name handler types through a
//! [`HandlerCatalog`] and are turned into metadata annotations by
//! [`VigilConfig::apply`].

use crate::catalog::HandlerCatalog;
use crate::descriptor::HandlerDescriptor;
use crate::errors::{Result, VigilError};
use crate::metadata::{Metadata, Scope};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of recognised environment overrides
pub const ENV_PREFIX: &str = "VIGIL_";

/// Trait for configuration defaults
pub trait ConfigDefaults {
    /// Default values for this configuration
    fn defaults() -> Self;
}

/// Trait for configuration merging
pub trait ConfigMerge {
    /// Merge `other` into this configuration; `other` wins on conflicts
    fn merge_with(&mut self, other: &Self) -> Result<()>;
}

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Lifecycle manager switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Tear down already-constructed handlers when a later setup fails
    pub rollback_on_setup_failure: bool,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` env-filter directive
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Where a registration applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    /// Module name
    pub module: Option<String>,
    /// Type name
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Method name; requires `type`
    pub method: Option<String>,
}

impl ScopeConfig {
    /// Resolve to a metadata scope
    pub fn to_scope(&self) -> Result<Scope> {
        match (&self.module, &self.type_name, &self.method) {
            (Some(module), None, None) => Ok(Scope::module(module.clone())),
            (None, Some(type_name), None) => Ok(Scope::of_type(type_name.clone())),
            (None, Some(type_name), Some(method)) => {
                Ok(Scope::method(type_name.clone(), method.clone()))
            }
            (None, None, Some(method)) => Err(VigilError::config(format!(
                "scope names method '{method}' without a type"
            ))),
            (None, None, None) => Err(VigilError::config("scope is empty")),
            (Some(module), _, _) => Err(VigilError::config(format!(
                "scope mixes module '{module}' with a type or method"
            ))),
        }
    }
}

/// One declarative handler registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationConfig {
    /// Where the handler applies
    pub scope: ScopeConfig,
    /// Catalog name of the handler type
    pub handler: String,
    /// Constructor arguments, passed as strings
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Sort key
    #[serde(default)]
    pub priority: i32,
}

impl RegistrationConfig {
    /// Build the handler descriptor this registration names
    pub fn to_descriptor(&self, catalog: &HandlerCatalog) -> Result<HandlerDescriptor> {
        let handler_type = catalog.resolve(&self.handler)?;
        Ok(HandlerDescriptor::new(handler_type)
            .with_arguments(self.arguments.iter().cloned().map(Value::new).collect())
            .with_priority(self.priority))
    }
}

impl ConfigValidation for RegistrationConfig {
    fn validate(&self) -> Result<()> {
        if self.handler.trim().is_empty() {
            return Err(VigilError::config("registration has an empty handler name"));
        }
        self.scope.to_scope().map(|_| ())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Lifecycle switches
    pub lifecycle: LifecycleConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// Declarative handler registrations
    pub registrations: Vec<RegistrationConfig>,
}

impl VigilConfig {
    /// Parse TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VigilError::config(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VigilError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `VIGIL_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_env_from(std::env::vars())
    }

    /// Apply `VIGIL_*` overrides from the given variables
    pub fn merge_env_from<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "LOG" => self.logging.filter = value.to_string(),
                "ROLLBACK_ON_SETUP_FAILURE" => {
                    self.lifecycle.rollback_on_setup_failure = parse_bool(key.as_ref(), value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Turn registrations into metadata annotations
    ///
    /// Every registration is resolved before anything is attached, so a bad
    /// entry leaves `metadata` untouched.
    pub fn apply(&self, catalog: &HandlerCatalog, metadata: &mut Metadata) -> Result<()> {
        self.validate()?;
        let resolved = self
            .registrations
            .iter()
            .map(|registration| -> Result<(Scope, HandlerDescriptor)> {
                Ok((registration.scope.to_scope()?, registration.to_descriptor(catalog)?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (scope, descriptor) in resolved {
            if let Scope::Module(module) = &scope {
                metadata.register_module(module.clone());
            }
            tracing::debug!(?scope, handler = descriptor.handler_type.name(), "registered handler");
            metadata.attach_handler(scope, descriptor);
        }
        Ok(())
    }
}

impl ConfigDefaults for VigilConfig {
    fn defaults() -> Self {
        Self::default()
    }
}

impl ConfigDefaults for LifecycleConfig {
    fn defaults() -> Self {
        Self::default()
    }
}

impl ConfigDefaults for LoggingConfig {
    fn defaults() -> Self {
        Self::default()
    }
}

impl ConfigMerge for VigilConfig {
    fn merge_with(&mut self, other: &Self) -> Result<()> {
        if other.lifecycle != LifecycleConfig::defaults() {
            self.lifecycle = other.lifecycle.clone();
        }
        if other.logging != LoggingConfig::defaults() {
            self.logging = other.logging.clone();
        }
        self.registrations.extend(other.registrations.iter().cloned());
        Ok(())
    }
}

impl ConfigValidation for VigilConfig {
    fn validate(&self) -> Result<()> {
        if self.logging.filter.trim().is_empty() {
            return Err(VigilError::config("logging.filter must not be empty"));
        }
        for (index, registration) in self.registrations.iter().enumerate() {
            registration.validate().map_err(|e| {
                VigilError::config(format!("registrations[{index}]: {e}"))
            })?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(VigilError::config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HandlerType;
    use crate::handler::Handler;
    use assert_matches::assert_matches;
    use std::io::Write;

    struct Named;
    impl Handler for Named {}

    const SAMPLE: &str = r#"
[lifecycle]
rollback_on_setup_failure = true

[logging]
filter = "vigil=debug"

[[registrations]]
scope = { module = "checkout" }
handler = "named"
arguments = ["checkout-db"]
priority = -10

[[registrations]]
scope = { type = "CartTest", method = "adds_item" }
handler = "named"
"#;

    fn catalog() -> HandlerCatalog {
        let mut catalog = HandlerCatalog::new();
        catalog.register(
            "named",
            HandlerType::builder("Named")
                .constructor(|(): ()| Ok(Named))
                .constructor(|(_name,): (String,)| Ok(Named))
                .build(),
        );
        catalog
    }

    #[test]
    fn test_parse_sample() {
        let config = VigilConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.lifecycle.rollback_on_setup_failure);
        assert_eq!(config.logging.filter, "vigil=debug");
        assert_eq!(config.registrations.len(), 2);
        assert_eq!(config.registrations[0].priority, -10);
        assert_eq!(
            config.registrations[1].scope.to_scope().unwrap(),
            Scope::method("CartTest", "adds_item")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = VigilConfig::from_toml_str("").unwrap();
        assert_eq!(config, VigilConfig::defaults());
        assert!(!config.lifecycle.rollback_on_setup_failure);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = VigilConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.registrations[0].arguments, ["checkout-db"]);

        let missing = VigilConfig::load_from_file(Path::new("/nonexistent/vigil.toml"));
        assert_matches!(missing, Err(VigilError::Config { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = VigilConfig::default();
        config
            .merge_env_from([
                ("VIGIL_LOG", "trace"),
                ("VIGIL_ROLLBACK_ON_SETUP_FAILURE", "true"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
        assert!(config.lifecycle.rollback_on_setup_failure);

        let bad = config.merge_env_from([("VIGIL_ROLLBACK_ON_SETUP_FAILURE", "maybe")]);
        assert_matches!(bad, Err(VigilError::Config { .. }));
    }

    #[test]
    fn test_method_without_type_is_rejected() {
        let config = VigilConfig::from_toml_str(
            r#"
[[registrations]]
scope = { method = "adds_item" }
handler = "named"
"#,
        )
        .unwrap();
        assert_matches!(config.validate(), Err(VigilError::Config { message }) if message.contains("without a type"));
    }

    #[test]
    fn test_apply_attaches_descriptors() {
        let config = VigilConfig::from_toml_str(SAMPLE).unwrap();
        let mut metadata = Metadata::new();
        config.apply(&catalog(), &mut metadata).unwrap();

        assert_eq!(metadata.modules(), ["checkout"]);
        let module_handlers = metadata.handlers(&Scope::module("checkout"));
        assert_eq!(module_handlers.len(), 1);
        assert_eq!(module_handlers[0].priority, -10);
        assert!(module_handlers[0].arguments[0].is::<String>());
        assert_eq!(metadata.handlers(&Scope::method("CartTest", "adds_item")).len(), 1);
    }

    #[test]
    fn test_apply_unknown_handler_leaves_metadata_untouched() {
        let mut config = VigilConfig::from_toml_str(SAMPLE).unwrap();
        config.registrations[1].handler = "missing".into();
        let mut metadata = Metadata::new();
        let result = config.apply(&catalog(), &mut metadata);
        assert_matches!(result, Err(VigilError::Config { message }) if message.contains("missing"));
        assert!(metadata.handlers(&Scope::module("checkout")).is_empty());
    }

    #[test]
    fn test_merge_appends_registrations_and_keeps_base_sections() {
        let mut base = VigilConfig::from_toml_str(SAMPLE).unwrap();
        let overlay = VigilConfig::from_toml_str(
            r#"
            [[registrations]]
            scope = { module = "storage" }
            handler = "named"
            "#,
        )
        .unwrap();
        base.merge_with(&overlay).unwrap();
        assert_eq!(base.logging.filter, "vigil=debug");
        assert!(base.lifecycle.rollback_on_setup_failure);
        assert_eq!(base.registrations.len(), 3);
    }

    #[test]
    fn test_merge_takes_non_default_overlay_sections() {
        let mut base = VigilConfig::default();
        let overlay = VigilConfig::from_toml_str(SAMPLE).unwrap();
        base.merge_with(&overlay).unwrap();
        assert!(base.lifecycle.rollback_on_setup_failure);
        assert_eq!(base.logging.filter, "vigil=debug");
    }
}
