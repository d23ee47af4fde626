use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected text or json, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub table_name: String,
    pub file_bucket: String,
    pub redis_url: String,
    pub index_name: String,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
    pub user_brief_ttl: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            table_name: required("TABLE_NAME")?,
            file_bucket: required("FILE_BUCKET")?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            index_name: lookup("GSI_NAME").unwrap_or_else(|| "GSI1".to_string()),
            store_timeout: Duration::from_millis(parsed(&lookup, "STORE_TIMEOUT_MS", 5000)?),
            cache_timeout: Duration::from_millis(parsed(&lookup, "CACHE_TIMEOUT_MS", 3000)?),
            user_brief_ttl: Duration::from_secs(parsed(&lookup, "USER_BRIEF_TTL_SECS", 86_400)?),
            log_format: parsed(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_everything_but_table_and_bucket() {
        let config =
            AppConfig::from_lookup(lookup(&[("TABLE_NAME", "errands"), ("FILE_BUCKET", "errand-files")]))
                .unwrap();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.index_name, "GSI1");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.cache_timeout, Duration::from_secs(3));
        assert_eq!(config.user_brief_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[rstest]
    #[case(&[("FILE_BUCKET", "b")], ConfigError::Missing("TABLE_NAME"))]
    #[case(&[("TABLE_NAME", "t")], ConfigError::Missing("FILE_BUCKET"))]
    fn required_variables(#[case] vars: &[(&str, &str)], #[case] expected: ConfigError) {
        assert_eq!(AppConfig::from_lookup(lookup(vars)), Err(expected));
    }

    #[rstest]
    #[case("STORE_TIMEOUT_MS", "soon")]
    #[case("USER_BRIEF_TTL_SECS", "-1")]
    #[case("LOG_FORMAT", "xml")]
    fn unparsable_values_are_rejected(#[case] key: &'static str, #[case] value: &str) {
        let vars = [("TABLE_NAME", "t"), ("FILE_BUCKET", "b"), (key, value)];
        assert!(matches!(
            AppConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { key: k, .. }) if k == key
        ));
    }

    #[test]
    fn overrides_are_read() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TABLE_NAME", "t"),
            ("FILE_BUCKET", "b"),
            ("REDIS_URL", "redis://cache:6379/2"),
            ("CACHE_TIMEOUT_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.redis_url, "redis://cache:6379/2");
        assert_eq!(config.cache_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
