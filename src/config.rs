use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::logging::LogFormat;
use crate::providers::cloudflare::client::DEFAULT_API_BASE;
use crate::relay::{DEFAULT_TOPIC_IN, DEFAULT_TOPIC_OUT};

#[derive(Clone)]
pub struct Config {
    pub cf_api_token: String,
    pub cf_api_base: String,
    pub default_ttl: u32,
    pub api_host: String,
    pub api_ca_cert: Option<String>,
    pub role_id: String,
    pub secret_id: String,
    pub managed_domains: HashSet<String>,
    pub debug_dns_verification: bool,
    pub token_refresh_margin: Duration,
    pub token_check_interval: Duration,
    pub topic_in: String,
    pub topic_out: String,
    pub hostname: String,
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cf_api_token", &"<REDACTED>")
            .field("cf_api_base", &self.cf_api_base)
            .field("default_ttl", &self.default_ttl)
            .field("api_host", &self.api_host)
            .field("api_ca_cert", &self.api_ca_cert.as_ref().map(|_| "<PEM>"))
            .field("role_id", &self.role_id)
            .field("secret_id", &"<REDACTED>")
            .field("managed_domains", &self.managed_domains)
            .field("debug_dns_verification", &self.debug_dns_verification)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("token_check_interval", &self.token_check_interval)
            .field("topic_in", &self.topic_in)
            .field("topic_out", &self.topic_out)
            .field("hostname", &self.hostname)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| {
            env::var(key).ok().or_else(|| match key {
                "HOSTNAME" => fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|h| h.trim().to_string()),
                _ => None,
            })
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| Error::ConfigError(format!("{key} is required")))
        };
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            cf_api_token: required("CF_API_TOKEN")?,
            cf_api_base: or("CF_API_BASE", DEFAULT_API_BASE),
            default_ttl: parse(&var, "CF_DEFAULT_TTL", 120)?,
            api_host: or("AVASSA_API_HOST", "https://api.internal:4646"),
            api_ca_cert: var("API_CA_CERT"),
            role_id: required("VOLGA_ROLE_ID")?,
            secret_id: required("APPROLE_SECRET_ID")?,
            managed_domains: parse_domains(&or("MANAGED_DOMAINS", "")),
            debug_dns_verification: or("ACME_DEBUG_DNS_VERIFICATION", "")
                .eq_ignore_ascii_case("true"),
            token_refresh_margin: Duration::from_secs(parse(&var, "TOKEN_REFRESH_MARGIN", 300)?),
            token_check_interval: Duration::from_secs(parse(&var, "TOKEN_CHECK_INTERVAL", 60)?),
            topic_in: or("TOPIC_IN", DEFAULT_TOPIC_IN),
            topic_out: or("TOPIC_OUT", DEFAULT_TOPIC_OUT),
            hostname: or("HOSTNAME", "localhost"),
            log_format: or("LOG_FORMAT", "text").parse()?,
        })
    }

    /// Relay consumer identity, unique per host.
    pub fn consumer_name(&self) -> String {
        format!("acme-cf-{}", self.hostname)
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, Error> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::ConfigError(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_domains(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
