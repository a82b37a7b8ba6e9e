use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;
use leadtime_core::AnnotationKeys;

/// Validator for configuration settings
pub trait Validator {
    /// Check the settings, returning the first problem found
    fn validate(&self) -> ConfigResult<()>;
}

/// Level names accepted, case-insensitively
pub const LOG_LEVELS: [&str; 7] = [
    "trace", "debug", "info", "warning", "warn", "error", "critical",
];

/// Log formats accepted, case-insensitively
pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.exporter.validate()?;
        self.annotations.validate()?;
        self.provider.validate()?;
        self.workloads.validate()?;
        if self.provider.tls_verify() {
            self.certificates.validate()?;
        }
        self.observability.validate()?;
        Ok(())
    }
}

impl Validator for ExporterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "exporter.poll_interval_secs",
                "must be greater than 0",
            ));
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid_value(
                "exporter.max_concurrency",
                "must be greater than 0",
            ));
        }

        if self.backoff_max_cycles == 0 {
            return Err(ConfigError::invalid_value(
                "exporter.backoff_max_cycles",
                "must be greater than 0",
            ));
        }

        if self.app_label.trim().is_empty() {
            return Err(ConfigError::missing("exporter.app_label"));
        }

        Ok(())
    }
}

impl Validator for AnnotationKeys {
    fn validate(&self) -> ConfigResult<()> {
        let names = [
            ("annotations.commit_hash", &self.commit_hash),
            ("annotations.repo_url", &self.repo_url),
            ("annotations.commit_date", &self.commit_date),
            ("annotations.deploy_time", &self.deploy_time),
            ("annotations.image_digest", &self.image_digest),
            ("annotations.failure_id", &self.failure_id),
            ("annotations.failure_time", &self.failure_time),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::missing(field));
            }
        }

        // Dates must carry an offset to land on the UTC timeline
        let has_offset = ["%z", "%:z", "%::z", "%#z", "%+"]
            .iter()
            .any(|spec| self.date_format.contains(spec));
        if !has_offset {
            return Err(ConfigError::invalid_value(
                "annotations.date_format",
                format!(
                    "'{}' has no UTC offset specifier (%z, %:z or %+)",
                    self.date_format
                ),
            ));
        }

        Ok(())
    }
}

impl Validator for ProviderConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => validate_api("provider.api", c.api.as_deref()),
            ProviderConfig::AzureDevOps(c) => {
                if c.api.trim().is_empty() {
                    return Err(ConfigError::missing("provider.api"));
                }
                validate_api("provider.api", Some(c.api.as_str()))?;
                if c.token.trim().is_empty() {
                    return Err(ConfigError::missing("provider.token"));
                }
                Ok(())
            }
            ProviderConfig::Image => Ok(()),
        }
    }
}

fn validate_api(field: &str, api: Option<&str>) -> ConfigResult<()> {
    match api {
        Some(api) if api.trim().is_empty() => {
            Err(ConfigError::invalid_value(field, "must not be empty"))
        }
        Some(api) if api.chars().any(char::is_whitespace) => Err(ConfigError::invalid_value(
            field,
            format!("'{}' must not contain whitespace", api),
        )),
        _ => Ok(()),
    }
}

impl Validator for WorkloadsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.manifest.as_os_str().is_empty() {
            return Err(ConfigError::missing("workloads.manifest"));
        }
        Ok(())
    }
}

/// Marker every PEM certificate block starts with
pub const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

impl Validator for CertificatesConfig {
    fn validate(&self) -> ConfigResult<()> {
        for path in &self.custom_pem_cert_files {
            let content = std::fs::read(path).map_err(|e| {
                ConfigError::invalid_value(
                    "certificates.custom_pem_cert_files",
                    format!("cannot read {}: {}", path.display(), e),
                )
            })?;
            let text = String::from_utf8_lossy(&content);
            if !text.contains(PEM_CERTIFICATE_HEADER) {
                return Err(ConfigError::invalid_value(
                    "certificates.custom_pem_cert_files",
                    format!("{} holds no PEM certificate", path.display()),
                ));
            }
        }
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        let level = self.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }

        let format = self.log_format.to_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", LOG_FORMATS.join(", ")),
            ));
        }

        self.metrics.validate()
    }
}

impl Validator for MetricsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.port == 0 {
            return Err(ConfigError::invalid_value(
                "observability.metrics.port",
                "port must be between 1 and 65535",
            ));
        }

        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "observability.metrics.bind_address",
                format!("'{}' is not an IP address", self.bind_address),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.exporter.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. })
                if field == "exporter.poll_interval_secs"
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.exporter.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_levels() {
        let mut config = ObservabilityConfig::default();
        for level in ["DEBUG", "info", "WARNING", "Critical", "trace"] {
            config.log_level = level.to_string();
            assert!(config.validate().is_ok(), "{} should be accepted", level);
        }
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format() {
        let mut config = ObservabilityConfig {
            log_format: "JSON".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_date_format_needs_offset() {
        let mut keys = AnnotationKeys {
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            ..Default::default()
        };
        assert!(keys.validate().is_err());
        keys.date_format = "%Y-%m-%dT%H:%M:%S%:z".to_string();
        assert!(keys.validate().is_ok());
    }

    #[test]
    fn test_blank_annotation_rejected() {
        let keys = AnnotationKeys {
            commit_hash: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            keys.validate(),
            Err(ConfigError::MissingRequired(ref field)) if field == "annotations.commit_hash"
        ));
    }

    #[test]
    fn test_azure_requires_api_and_token() {
        let mut azure = AzureDevOpsConfig::default();
        assert!(ProviderConfig::AzureDevOps(azure.clone()).validate().is_err());

        azure.api = "https://dev.azure.com/org".to_string();
        assert!(matches!(
            ProviderConfig::AzureDevOps(azure.clone()).validate(),
            Err(ConfigError::MissingRequired(ref field)) if field == "provider.token"
        ));

        azure.token = "pat".to_string();
        assert!(ProviderConfig::AzureDevOps(azure).validate().is_ok());
    }

    #[test]
    fn test_git_api_whitespace_rejected() {
        let provider = ProviderConfig::GitHub(GitProviderConfig {
            api: Some("github example.com".to_string()),
            ..Default::default()
        });
        assert!(provider.validate().is_err());
    }

    #[test]
    fn test_missing_certificate_file_rejected() {
        let certificates = CertificatesConfig {
            custom_pem_cert_files: vec!["/nonexistent/ca.pem".into()],
        };
        assert!(matches!(
            certificates.validate(),
            Err(ConfigError::InvalidValue { ref field, .. })
                if field == "certificates.custom_pem_cert_files"
        ));
    }

    #[test]
    fn test_certificates_ignored_without_tls_verification() {
        let mut config = Config {
            certificates: CertificatesConfig {
                custom_pem_cert_files: vec!["/nonexistent/ca.pem".into()],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.provider = ProviderConfig::GitHub(GitProviderConfig {
            tls_verify: false,
            ..Default::default()
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_metrics_bind_address() {
        let mut metrics = MetricsConfig {
            bind_address: "localhost:80".to_string(),
            ..Default::default()
        };
        assert!(metrics.validate().is_err());

        metrics.enabled = false;
        assert!(metrics.validate().is_ok());
    }
}
