//! Graph-wide settings.
//!
//! Settings can be built in code or loaded from YAML:
//!
//! ```rust
//! use cmdgraph::Settings;
//!
//! let settings = Settings::from_yaml_str("version: 2.1.0\nenable_env_directive: true\n").unwrap();
//! assert_eq!(settings.version.as_deref(), Some("2.1.0"));
//! assert!(settings.enable_env_directive);
//! assert!(settings.enable_help);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Adds `-h`/`--help` to every command.
    pub enable_help: bool,
    /// Adds `--version` to the root command.
    pub enable_version: bool,
    pub version: Option<String>,
    /// Program name shown in help and usage. Defaults to the root's name.
    pub executable_name: Option<String>,
    pub enable_suggest_directive: bool,
    pub enable_diagram_directive: bool,
    pub enable_env_directive: bool,
    /// Lets function parameters fall back to the service resolver.
    pub resolve_functions_from_services: bool,
    /// Print handler and binding errors and exit with 1 instead of
    /// returning them.
    pub enable_default_error_handler: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_help: true,
            enable_version: true,
            version: None,
            executable_name: None,
            enable_suggest_directive: true,
            enable_diagram_directive: false,
            enable_env_directive: false,
            resolve_functions_from_services: false,
            enable_default_error_handler: true,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn with_help(mut self, enabled: bool) -> Self {
        self.enable_help = enabled;
        self
    }

    /// Sets the version string and enables `--version`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self.enable_version = true;
        self
    }

    pub fn without_version(mut self) -> Self {
        self.enable_version = false;
        self
    }

    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = Some(name.into());
        self
    }

    pub fn with_suggest_directive(mut self, enabled: bool) -> Self {
        self.enable_suggest_directive = enabled;
        self
    }

    pub fn with_diagram_directive(mut self, enabled: bool) -> Self {
        self.enable_diagram_directive = enabled;
        self
    }

    pub fn with_env_directive(mut self, enabled: bool) -> Self {
        self.enable_env_directive = enabled;
        self
    }

    pub fn with_functions_from_services(mut self, enabled: bool) -> Self {
        self.resolve_functions_from_services = enabled;
        self
    }

    pub fn with_default_error_handler(mut self, enabled: bool) -> Self {
        self.enable_default_error_handler = enabled;
        self
    }
}
