//! AWS credentials for the `aws` CLI, read from a key file or the environment

use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::constants;
use crate::errors::ConfigError;

const KEY_ID_VARS: [&str; 2] = ["ACCESS_KEY", "AWS_ACCESS_KEY_ID"];
const SECRET_VARS: [&str; 2] = ["SECRET_KEY", "AWS_SECRET_ACCESS_KEY"];

#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, region: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            region: region.to_string(),
        }
    }

    /// Load from a file of `AWSAccessKeyId=...` / `AWSSecretKey=...` lines
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let expanded = expand_home(path);
        debug!("loading aws-creds from {}", expanded);

        let content =
            std::fs::read_to_string(&expanded).map_err(|e| ConfigError::LoadFailed {
                path: expanded.clone(),
                reason: e.to_string(),
            })?;
        Self::parse(&content, &expanded)
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let entries: HashMap<&str, &str> = content
            .lines()
            .filter_map(|line| line.trim().split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let access_key_id = entries
            .get("AWSAccessKeyId")
            .ok_or_else(|| ConfigError::MissingRequired {
                field: format!("AWSAccessKeyId in {}", origin),
            })?;
        let secret_access_key = entries
            .get("AWSSecretKey")
            .ok_or_else(|| ConfigError::MissingRequired {
                field: format!("AWSSecretKey in {}", origin),
            })?;

        Ok(Self::new(
            access_key_id,
            secret_access_key,
            &region_from_env(),
        ))
    }

    /// Load from `ACCESS_KEY`/`AWS_ACCESS_KEY_ID` and `SECRET_KEY`/`AWS_SECRET_ACCESS_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        debug!("loading aws-creds from env");
        let access_key_id = first_env(&KEY_ID_VARS).ok_or_else(|| ConfigError::MissingRequired {
            field: "environment variable AWS_ACCESS_KEY_ID".to_string(),
        })?;
        let secret_access_key =
            first_env(&SECRET_VARS).ok_or_else(|| ConfigError::MissingRequired {
                field: "environment variable AWS_SECRET_ACCESS_KEY".to_string(),
            })?;
        Ok(Self::new(
            &access_key_id,
            &secret_access_key,
            &region_from_env(),
        ))
    }

    /// File when given, environment otherwise
    pub fn resolve(creds_file: Option<&str>) -> Result<Self, ConfigError> {
        match creds_file {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Environment passed to every `aws` invocation
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key_id.clone()),
            (
                "AWS_SECRET_ACCESS_KEY".to_string(),
                self.secret_access_key.clone(),
            ),
            ("AWS_DEFAULT_REGION".to_string(), self.region.clone()),
        ]
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

fn region_from_env() -> String {
    std::env::var("AWS_DEFAULT_REGION")
        .ok()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| constants::storage::DEFAULT_REGION.to_string())
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_file() {
        let creds = AwsCredentials::parse(
            "AWSAccessKeyId=AKIAEXAMPLE\nAWSSecretKey = s3cr3t\n",
            "test",
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "s3cr3t");
    }

    #[test]
    fn key_file_without_secret_is_rejected() {
        let err = AwsCredentials::parse("AWSAccessKeyId=AKIAEXAMPLE\n", "creds").unwrap_err();
        assert!(err.to_string().contains("AWSSecretKey"));
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = AwsCredentials::new("AKIA", "very-secret", "us-east-1");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("AKIA"));
    }
}
