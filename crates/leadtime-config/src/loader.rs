// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{
    Config, ExporterConfig, MetricsConfig, ObservabilityConfig, ProviderConfig, WorkloadsConfig,
    PROVIDER_NAMES,
};
use crate::validation::Validator;
use leadtime_core::{AnnotationKeys, MetricKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Source of environment variables
pub trait EnvSource {
    /// Value of `name`, if set
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Value of an override variable
#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvValue {
    /// The literal `default`: reset the setting to its default
    Default,
    /// Anything else
    Set { name: &'static str, value: String },
}

/// First non-empty variable among `names`
fn lookup(env: &dyn EnvSource, names: &[&'static str]) -> Option<EnvValue> {
    names.iter().copied().find_map(|name| {
        let value = env.var(name)?;
        let value = value.trim();
        if value.is_empty() {
            None
        } else if value.eq_ignore_ascii_case("default") {
            Some(EnvValue::Default)
        } else {
            Some(EnvValue::Set {
                name,
                value: value.to_string(),
            })
        }
    })
}

fn parse_env<T: FromStr>(name: &str, value: &str, expected: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::env_var_parsing_error(name, value, expected))
}

/// Configuration loader
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).await?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let mut config = match format {
            ConfigFormat::Toml => self.parse_toml(content)?,
            ConfigFormat::Yaml => self.parse_yaml(content)?,
            ConfigFormat::Json => self.parse_json(content)?,
        };

        debug!("Configuration loaded from {}", format.name());

        if self.validate {
            config.provider.normalize_credentials();
            config.validate()?;
            info!("Configuration validated successfully");
        }

        Ok(config)
    }

    /// Load the file when given, or start from defaults, then apply
    /// overrides from `env`
    pub async fn load_with_env<P: AsRef<Path>>(
        &self,
        path: Option<P>,
        env: &dyn EnvSource,
    ) -> ConfigResult<Config> {
        let mut config = match path {
            Some(path) => Self::without_validation().load_file(path).await?,
            None => Config::default(),
        };
        self.apply_env_overrides_from(&mut config, env)?;
        config.provider.normalize_credentials();

        if self.validate {
            config.validate()?;
            info!("Configuration validated successfully");
        }
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub async fn load_with_overrides<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        self.load_with_env(Some(path), &SystemEnv).await
    }

    /// Parse TOML configuration
    fn parse_toml(&self, content: &str) -> ConfigResult<Config> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Parse YAML configuration
    fn parse_yaml(&self, content: &str) -> ConfigResult<Config> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Parse JSON configuration
    fn parse_json(&self, content: &str) -> ConfigResult<Config> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        self.apply_env_overrides_from(config, &SystemEnv)
    }

    /// Apply environment variable overrides.
    ///
    /// Each setting may be named by several variables; the first one set
    /// wins. The value `default` resets the setting to its default.
    pub fn apply_env_overrides_from(
        &self,
        config: &mut Config,
        env: &dyn EnvSource,
    ) -> ConfigResult<()> {
        let exporter_defaults = ExporterConfig::default();
        let observability_defaults = ObservabilityConfig::default();
        let metrics_defaults = MetricsConfig::default();
        let annotation_defaults = AnnotationKeys::default();

        // Observability settings
        match lookup(env, &["LOG_LEVEL"]) {
            Some(EnvValue::Set { value, .. }) => config.observability.log_level = value,
            Some(EnvValue::Default) => {
                config.observability.log_level = observability_defaults.log_level
            }
            None => {}
        }
        match lookup(env, &["LOG_FORMAT"]) {
            Some(EnvValue::Set { value, .. }) => config.observability.log_format = value,
            Some(EnvValue::Default) => {
                config.observability.log_format = observability_defaults.log_format
            }
            None => {}
        }
        match lookup(env, &["METRICS_ENABLED"]) {
            Some(EnvValue::Set { name, value }) => {
                config.observability.metrics.enabled = parse_bool(name, &value)?
            }
            Some(EnvValue::Default) => {
                config.observability.metrics.enabled = metrics_defaults.enabled
            }
            None => {}
        }
        match lookup(env, &["METRICS_PORT"]) {
            Some(EnvValue::Set { name, value }) => {
                config.observability.metrics.port =
                    parse_env(name, &value, "expected valid port number")?
            }
            Some(EnvValue::Default) => config.observability.metrics.port = metrics_defaults.port,
            None => {}
        }

        // Exporter settings
        match lookup(env, &["EXPORTER_KIND"]) {
            Some(EnvValue::Set { name, value }) => {
                config.exporter.kind = value.parse::<MetricKind>().map_err(|reason| {
                    ConfigError::env_var_parsing_error(name, &value, reason)
                })?
            }
            Some(EnvValue::Default) => config.exporter.kind = exporter_defaults.kind,
            None => {}
        }
        match lookup(env, &["NAMESPACES"]) {
            Some(EnvValue::Set { value, .. }) => config.exporter.namespaces = split_list(&value),
            Some(EnvValue::Default) => config.exporter.namespaces = exporter_defaults.namespaces,
            None => {}
        }
        match lookup(env, &["APP_LABEL"]) {
            Some(EnvValue::Set { value, .. }) => config.exporter.app_label = value,
            Some(EnvValue::Default) => config.exporter.app_label = exporter_defaults.app_label,
            None => {}
        }
        match lookup(env, &["POLL_INTERVAL"]) {
            Some(EnvValue::Set { name, value }) => {
                config.exporter.poll_interval_secs =
                    parse_env(name, &value, "expected whole seconds")?
            }
            Some(EnvValue::Default) => {
                config.exporter.poll_interval_secs = exporter_defaults.poll_interval_secs
            }
            None => {}
        }
        match lookup(env, &["MAX_CONCURRENCY"]) {
            Some(EnvValue::Set { name, value }) => {
                config.exporter.max_concurrency = parse_env(name, &value, "expected valid integer")?
            }
            Some(EnvValue::Default) => {
                config.exporter.max_concurrency = exporter_defaults.max_concurrency
            }
            None => {}
        }
        match lookup(env, &["BACKOFF_MAX_CYCLES"]) {
            Some(EnvValue::Set { name, value }) => {
                config.exporter.backoff_max_cycles =
                    parse_env(name, &value, "expected valid integer")?
            }
            Some(EnvValue::Default) => {
                config.exporter.backoff_max_cycles = exporter_defaults.backoff_max_cycles
            }
            None => {}
        }
        match lookup(env, &["IMAGE_FALLBACK"]) {
            Some(EnvValue::Set { name, value }) => {
                config.exporter.image_fallback = parse_bool(name, &value)?
            }
            Some(EnvValue::Default) => {
                config.exporter.image_fallback = exporter_defaults.image_fallback
            }
            None => {}
        }

        // Annotation names
        match lookup(env, &["COMMIT_HASH_ANNOTATION"]) {
            Some(EnvValue::Set { value, .. }) => config.annotations.commit_hash = value,
            Some(EnvValue::Default) => {
                config.annotations.commit_hash = annotation_defaults.commit_hash.clone()
            }
            None => {}
        }
        match lookup(env, &["COMMIT_REPO_URL_ANNOTATION"]) {
            Some(EnvValue::Set { value, .. }) => config.annotations.repo_url = value,
            Some(EnvValue::Default) => {
                config.annotations.repo_url = annotation_defaults.repo_url.clone()
            }
            None => {}
        }
        match lookup(env, &["COMMIT_DATE_ANNOTATION"]) {
            Some(EnvValue::Set { value, .. }) => config.annotations.commit_date = value,
            Some(EnvValue::Default) => {
                config.annotations.commit_date = annotation_defaults.commit_date.clone()
            }
            None => {}
        }
        match lookup(env, &["COMMIT_DATE_FORMAT"]) {
            Some(EnvValue::Set { value, .. }) => config.annotations.date_format = value,
            Some(EnvValue::Default) => {
                config.annotations.date_format = annotation_defaults.date_format.clone()
            }
            None => {}
        }

        // Workload discovery
        match lookup(env, &["WORKLOAD_MANIFEST"]) {
            Some(EnvValue::Set { value, .. }) => config.workloads.manifest = PathBuf::from(value),
            Some(EnvValue::Default) => {
                config.workloads.manifest = WorkloadsConfig::default().manifest
            }
            None => {}
        }

        match lookup(env, &["REQUESTS_CUSTOM_PEM_CERT_FILES"]) {
            Some(EnvValue::Set { value, .. }) => {
                config.certificates.custom_pem_cert_files =
                    split_list(&value).into_iter().map(PathBuf::from).collect()
            }
            Some(EnvValue::Default) => config.certificates.custom_pem_cert_files = Vec::new(),
            None => {}
        }

        self.apply_provider_overrides(&mut config.provider, env)
    }

    fn apply_provider_overrides(
        &self,
        provider: &mut ProviderConfig,
        env: &dyn EnvSource,
    ) -> ConfigResult<()> {
        match lookup(env, &["GIT_PROVIDER", "PROVIDER"]) {
            Some(EnvValue::Set { name, value }) => {
                *provider = provider.switch_to(&value).ok_or_else(|| {
                    ConfigError::env_var_parsing_error(
                        name,
                        &value,
                        format!("expected one of: {}", PROVIDER_NAMES.join(", ")),
                    )
                })?;
            }
            Some(EnvValue::Default) => *provider = ProviderConfig::default(),
            None => {}
        }

        let api = lookup(env, &["GIT_API", "GITHUB_API"]);
        let user = lookup(env, &["API_USER", "GIT_USER", "GITHUB_USER"]);
        let token = lookup(env, &["TOKEN", "GIT_TOKEN", "GITHUB_TOKEN"]);
        let tls_verify = match lookup(env, &["TLS_VERIFY"]) {
            Some(EnvValue::Set { name, value }) => Some(parse_bool(name, &value)?),
            Some(EnvValue::Default) => Some(true),
            None => None,
        };

        let set_or_clear = |value: Option<EnvValue>, field: &mut Option<String>| match value {
            Some(EnvValue::Set { value, .. }) => *field = Some(value),
            Some(EnvValue::Default) => *field = None,
            None => {}
        };

        match provider {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => {
                set_or_clear(api, &mut c.api);
                set_or_clear(user, &mut c.credentials.username);
                set_or_clear(token, &mut c.credentials.token);
                if let Some(verify) = tls_verify {
                    c.tls_verify = verify;
                }
            }
            ProviderConfig::AzureDevOps(c) => {
                let mut api_value = Some(c.api.clone()).filter(|a| !a.is_empty());
                set_or_clear(api, &mut api_value);
                c.api = api_value.unwrap_or_default();

                let mut token_value = Some(c.token.clone()).filter(|t| !t.is_empty());
                set_or_clear(token, &mut token_value);
                c.token = token_value.unwrap_or_default();

                if user.is_some() {
                    debug!("Azure DevOps authenticates with the token alone; ignoring API user");
                }
                if let Some(verify) = tls_verify {
                    c.tls_verify = verify;
                }
            }
            ProviderConfig::Image => {
                if api.is_some() || user.is_some() || token.is_some() {
                    warn!("Git API settings are ignored by the image provider");
                }
            }
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a comma-separated list, trimming entries and dropping empties
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_var_parsing_error(
            name,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::GitProviderConfig;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path("config.toml").unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path("config.yaml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.yml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.json").unwrap(), ConfigFormat::Json);
    }

    #[test]
    fn test_format_detection_error() {
        assert!(ConfigFormat::from_path("config.xml").is_err());
        assert!(ConfigFormat::from_path("config").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "YES").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(parse_bool("X", "on").unwrap());
        assert!(!parse_bool("X", "false").unwrap());
        assert!(!parse_bool("X", "no").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "invalid").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" prod, ,staging ,"), vec!["prod", "staging"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_first_alias_wins() {
        let vars = env(&[("GITHUB_TOKEN", "later"), ("GIT_TOKEN", "first"), ("TOKEN", "")]);
        let found = lookup(&vars, &["TOKEN", "GIT_TOKEN", "GITHUB_TOKEN"]);
        assert_eq!(
            found,
            Some(EnvValue::Set {
                name: "GIT_TOKEN",
                value: "first".to_string()
            })
        );
    }

    #[test]
    fn test_default_keyword_resets() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        config.exporter.poll_interval_secs = 300;
        config.observability.log_level = "DEBUG".to_string();

        let vars = env(&[("POLL_INTERVAL", "default"), ("LOG_LEVEL", "DEFAULT")]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();

        assert_eq!(config.exporter.poll_interval_secs, 30);
        assert_eq!(config.observability.log_level, "INFO");
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[
            ("EXPORTER_KIND", "deploy"),
            ("NAMESPACES", "prod, staging"),
            ("POLL_INTERVAL", "60"),
            ("IMAGE_FALLBACK", "yes"),
            ("METRICS_PORT", "9100"),
            ("COMMIT_DATE_FORMAT", "%Y-%m-%dT%H:%M:%S%z"),
            ("WORKLOAD_MANIFEST", "/etc/leadtime/workloads.json"),
        ]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();

        assert_eq!(config.exporter.kind, MetricKind::Deploy);
        assert_eq!(config.exporter.namespaces, vec!["prod", "staging"]);
        assert_eq!(config.exporter.poll_interval_secs, 60);
        assert!(config.exporter.image_fallback);
        assert_eq!(config.observability.metrics.port, 9100);
        assert_eq!(config.annotations.date_format, "%Y-%m-%dT%H:%M:%S%z");
        assert_eq!(
            config.workloads.manifest,
            PathBuf::from("/etc/leadtime/workloads.json")
        );
    }

    #[test]
    fn test_custom_ca_files_override() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[(
            "REQUESTS_CUSTOM_PEM_CERT_FILES",
            "/etc/pki/a.pem, ,/etc/pki/b.pem",
        )]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();
        assert_eq!(
            config.certificates.custom_pem_cert_files,
            vec![PathBuf::from("/etc/pki/a.pem"), PathBuf::from("/etc/pki/b.pem")]
        );

        let vars = env(&[("REQUESTS_CUSTOM_PEM_CERT_FILES", "default")]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();
        assert!(config.certificates.custom_pem_cert_files.is_empty());
    }

    #[test]
    fn test_invalid_env_value() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[("MAX_CONCURRENCY", "lots")]);
        let err = loader.apply_env_overrides_from(&mut config, &vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvVarParsingError { ref variable_name, .. }
                if variable_name == "MAX_CONCURRENCY"
        ));
    }

    #[test]
    fn test_provider_switch_and_credentials() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[
            ("GIT_PROVIDER", "gitlab"),
            ("GIT_API", "gitlab.example.com"),
            ("GIT_USER", "bot"),
            ("GIT_TOKEN", "glpat"),
            ("TLS_VERIFY", "false"),
        ]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();

        assert_eq!(
            config.provider,
            ProviderConfig::GitLab(GitProviderConfig {
                api: Some("gitlab.example.com".to_string()),
                credentials: crate::schema::Credentials::new("bot", "glpat"),
                tls_verify: false,
            })
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[("PROVIDER", "svn")]);
        assert!(loader.apply_env_overrides_from(&mut config, &vars).is_err());
    }

    #[test]
    fn test_azure_token_from_env() {
        let loader = ConfigLoader::without_validation();
        let mut config = Config::default();
        let vars = env(&[
            ("GIT_PROVIDER", "azure-devops"),
            ("GIT_API", "https://dev.azure.com/org"),
            ("API_USER", "ignored"),
            ("TOKEN", "pat"),
        ]);
        loader.apply_env_overrides_from(&mut config, &vars).unwrap();

        match config.provider {
            ProviderConfig::AzureDevOps(c) => {
                assert_eq!(c.api, "https://dev.azure.com/org");
                assert_eq!(c.token, "pat");
            }
            other => panic!("unexpected provider {:?}", other),
        }
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::without_validation();
        let toml = r#"
        [exporter]
        kind = "failure"
        poll_interval_secs = 120

        [provider]
        type = "gitea"
        api = "git.example.com"

        [observability]
        log_level = "DEBUG"
        "#;
        let config = loader.load_from_string(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.exporter.kind, MetricKind::Failure);
        assert_eq!(config.exporter.max_concurrency, 4);
        assert_eq!(config.provider.name(), "gitea");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_parse_yaml() {
        let loader = ConfigLoader::without_validation();
        let yaml = r#"exporter:
  namespaces: [prod]
provider:
  type: image
annotations:
  commit_hash: example.com/sha"#;
        let config = loader.load_from_string(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.provider, ProviderConfig::Image);
        assert_eq!(config.annotations.commit_hash, "example.com/sha");
        assert_eq!(config.annotations.commit_date, "io.openshift.build.commit.date");
    }

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new();
        let json = r#"{"provider": {"type": "github",
            "credentials": {"username": "bot", "token": "t"}}}"#;
        let config = loader.load_from_string(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.provider.api(), Some("api.github.com"));
    }
}
