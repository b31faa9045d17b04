use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::editing::flow::FlowSettings;
use crate::editing::mask::CoverageRatio;

const DEFAULT_RELAY_URL: &str = "https://transfer.sh/";
const DEFAULT_FLOW_TIMEOUT: u64 = 180;
const DEFAULT_SESSION_TTL: u64 = 600;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "{name} is not set"),
            Self::Invalid { name, value } => write!(f, "{name} has an invalid value: {value:?}"),
        }
    }
}

/// settings read from the environment at startup
pub struct Config {
    pub telegram_token: String,
    pub replicate_api_token: String,
    pub openai_api_key: Option<String>,
    pub relay_url: Url,
    pub flow_timeout: Duration,
    pub session_ttl: Duration,
    pub mask_ratio: CoverageRatio,
    pub user_agent: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));
        let invalid = |name: &'static str, value: &str| ConfigError::Invalid {
            name,
            value: value.into(),
        };

        let seconds = |name: &'static str, default: u64| match optional(name) {
            Some(value) => match value.trim().parse() {
                Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
                _ => Err(invalid(name, &value)),
            },
            None => Ok(Duration::from_secs(default)),
        };

        let relay_url = match optional("RELAY_URL") {
            Some(value) => parse_relay_url(&value).ok_or_else(|| invalid("RELAY_URL", &value))?,
            None => parse_relay_url(DEFAULT_RELAY_URL)
                .ok_or_else(|| invalid("RELAY_URL", DEFAULT_RELAY_URL))?,
        };

        let mask_ratio = match optional("MASK_RATIO") {
            Some(value) => {
                CoverageRatio::parse(&value).ok_or_else(|| invalid("MASK_RATIO", &value))?
            }
            None => CoverageRatio::DEFAULT,
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_TOKEN")?,
            replicate_api_token: required("REPLICATE_API_TOKEN")?,
            openai_api_key: optional("OPENAI_API_KEY"),
            relay_url,
            flow_timeout: seconds("FLOW_TIMEOUT_SECS", DEFAULT_FLOW_TIMEOUT)?,
            session_ttl: seconds("SESSION_TTL_SECS", DEFAULT_SESSION_TTL)?,
            mask_ratio,
            user_agent: optional("USER_AGENT"),
        })
    }

    pub const fn flow_settings(&self) -> FlowSettings {
        FlowSettings { mask_ratio: self.mask_ratio, deadline: self.flow_timeout }
    }
}

/// relay URLs are joined with file names, so the path needs a trailing slash
fn parse_relay_url(value: &str) -> Option<Url> {
    let mut url = Url::parse(value.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Some(url)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars = vars
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] =
        [("TELEGRAM_TOKEN", "123:abc"), ("REPLICATE_API_TOKEN", "r8_token")];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.relay_url.as_str(), "https://transfer.sh/");
        assert_eq!(config.flow_timeout, Duration::from_secs(180));
        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.mask_ratio, CoverageRatio::DEFAULT);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.user_agent, None);
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(load(&REQUIRED[..1]).err(), Some(ConfigError::Missing("REPLICATE_API_TOKEN")));
        assert_eq!(
            load(&[("TELEGRAM_TOKEN", " "), REQUIRED[1]]).err(),
            Some(ConfigError::Missing("TELEGRAM_TOKEN"))
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            REQUIRED[0],
            REQUIRED[1],
            ("OPENAI_API_KEY", "sk-test"),
            ("RELAY_URL", "https://relay.example.com/upload"),
            ("FLOW_TIMEOUT_SECS", "90"),
            ("SESSION_TTL_SECS", "60"),
            ("MASK_RATIO", "0.5x0.5"),
        ])
        .unwrap();

        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.relay_url.as_str(), "https://relay.example.com/upload/");
        assert_eq!(config.flow_settings().deadline, Duration::from_secs(90));
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.flow_settings().mask_ratio, CoverageRatio::new(0.5, 0.5).unwrap());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[REQUIRED[0], REQUIRED[1], ("MASK_RATIO", "1.5x0.7")]),
            Err(ConfigError::Invalid { name: "MASK_RATIO", .. })
        ));
        assert!(matches!(
            load(&[REQUIRED[0], REQUIRED[1], ("FLOW_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { name: "FLOW_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            load(&[REQUIRED[0], REQUIRED[1], ("RELAY_URL", "ftp://relay.example.com")]),
            Err(ConfigError::Invalid { name: "RELAY_URL", .. })
        ));
    }
}
