//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default IMAP host when `IMAP_SERVER` is not set.
pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";

/// Default subject filter for label emails.
pub const DEFAULT_SUBJECT_KEYWORD: &str = "Bordereau d'envoi Vinted";

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
}

impl MailboxConfig {
    /// Build config from `EMAIL_ADDRESS`, `EMAIL_PASSWORD`, `IMAP_SERVER`
    /// and `IMAP_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let username = required(&lookup, "EMAIL_ADDRESS")?;
        let password = required(&lookup, "EMAIL_PASSWORD")?;

        let imap_host = lookup("IMAP_SERVER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string());

        let imap_port = match lookup("IMAP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "IMAP_PORT".into(),
                message: format!("expected a port number, got {raw:?}"),
            })?,
            None => 993,
        };

        Ok(Self {
            imap_host,
            imap_port,
            username,
            password: SecretString::from(password),
        })
    }
}

/// Run-level settings for the label pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Subject keyword used to select label emails.
    pub subject_keyword: String,
    /// Directory under which one folder per run is created.
    pub output_root: PathBuf,
    /// Keep `UNKNOWN` entries in the persisted identifier list.
    pub keep_unknown_ids: bool,
    /// Stamp `SKU: {id}` on each cropped label.
    pub stamp_ids: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subject_keyword: DEFAULT_SUBJECT_KEYWORD.to_string(),
            output_root: PathBuf::from("bordereaux"),
            keep_unknown_ids: true,
            stamp_ids: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let subject_keyword = lookup("BORDEREAUX_SUBJECT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.subject_keyword);

        let output_root = lookup("BORDEREAUX_OUTPUT_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_root);

        let keep_unknown_ids = match lookup("BORDEREAUX_KEEP_UNKNOWN_IDS") {
            Some(raw) => parse_bool("BORDEREAUX_KEEP_UNKNOWN_IDS", &raw)?,
            None => defaults.keep_unknown_ids,
        };

        let stamp_ids = match lookup("BORDEREAUX_STAMP_IDS") {
            Some(raw) => parse_bool("BORDEREAUX_STAMP_IDS", &raw)?,
            None => defaults.stamp_ids,
        };

        Ok(Self {
            subject_keyword,
            output_root,
            keep_unknown_ids,
            stamp_ids,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn mailbox_config_requires_credentials() {
        let err = MailboxConfig::from_lookup(env(&[("EMAIL_PASSWORD", "pw")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "EMAIL_ADDRESS"));

        let err = MailboxConfig::from_lookup(env(&[("EMAIL_ADDRESS", "me@test.com")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "EMAIL_PASSWORD"));
    }

    #[test]
    fn mailbox_config_defaults() {
        let cfg = MailboxConfig::from_lookup(env(&[
            ("EMAIL_ADDRESS", "me@test.com"),
            ("EMAIL_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(cfg.imap_host, DEFAULT_IMAP_HOST);
        assert_eq!(cfg.imap_port, 993);
        assert_eq!(cfg.username, "me@test.com");
        assert_eq!(cfg.password.expose_secret(), "pw");
    }

    #[test]
    fn mailbox_config_rejects_bad_port() {
        let err = MailboxConfig::from_lookup(env(&[
            ("EMAIL_ADDRESS", "me@test.com"),
            ("EMAIL_PASSWORD", "pw"),
            ("IMAP_PORT", "imaps"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn pipeline_config_defaults_and_overrides() {
        let cfg = PipelineConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(cfg.subject_keyword, DEFAULT_SUBJECT_KEYWORD);
        assert_eq!(cfg.output_root, PathBuf::from("bordereaux"));
        assert!(cfg.keep_unknown_ids);
        assert!(cfg.stamp_ids);

        let cfg = PipelineConfig::from_lookup(env(&[
            ("BORDEREAUX_OUTPUT_DIR", "/tmp/labels"),
            ("BORDEREAUX_KEEP_UNKNOWN_IDS", "no"),
            ("BORDEREAUX_STAMP_IDS", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.output_root, PathBuf::from("/tmp/labels"));
        assert!(!cfg.keep_unknown_ids);
        assert!(!cfg.stamp_ids);
    }

    #[test]
    fn pipeline_config_rejects_bad_bool() {
        let err =
            PipelineConfig::from_lookup(env(&[("BORDEREAUX_STAMP_IDS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BORDEREAUX_STAMP_IDS"));
    }
}
