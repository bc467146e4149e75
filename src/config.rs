use anyhow::{Context, anyhow};
use iso_downloads_influxdb::InfluxDbClient;
use iso_downloads_logs::UbuntuCodenames;
use secrecy::{ExposeSecret, SecretString};
use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_INFLUXDB_PORT: u16 = 8086;
const DEFAULT_INFLUXDB_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UNSUPPORTED_SERVERS: &[&str] = &["cdimage"];

#[derive(Debug)]
pub struct Config {
    /// `None` if no `INFLUXDB_HOSTNAME` is configured, in which case the
    /// measurements are printed instead of stored.
    pub influxdb: Option<InfluxDbConfig>,
    /// Servers whose log format is not supported by the parser.
    pub unsupported_servers: Vec<String>,
    pub distro_info_csv: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(&var)
    }

    fn from_vars(vars: &Vars) -> anyhow::Result<Self> {
        let unsupported_servers = match list(vars, "ISO_DOWNLOADS_UNSUPPORTED_SERVERS")? {
            Some(servers) => servers,
            None => DEFAULT_UNSUPPORTED_SERVERS
                .iter()
                .map(|server| server.to_string())
                .collect(),
        };

        let distro_info_csv = vars("DISTRO_INFO_CSV")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(UbuntuCodenames::DEFAULT_CSV_PATH));

        Ok(Self {
            influxdb: InfluxDbConfig::from_vars(vars)?,
            unsupported_servers,
            distro_info_csv,
        })
    }
}

pub struct InfluxDbConfig {
    pub base_url: Url,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timeout: Duration,
}

impl InfluxDbConfig {
    fn from_vars(vars: &Vars) -> anyhow::Result<Option<Self>> {
        let Some(hostname) = vars("INFLUXDB_HOSTNAME")? else {
            return Ok(None);
        };

        let port = var_parsed(vars, "INFLUXDB_PORT")?.unwrap_or(DEFAULT_INFLUXDB_PORT);
        let base_url = Url::parse(&format!("http://{hostname}:{port}/"))
            .context("Failed to build InfluxDB URL from INFLUXDB_HOSTNAME and INFLUXDB_PORT")?;

        let database = vars("INFLUXDB_DATABASE")?
            .ok_or_else(|| anyhow!("Failed to find required INFLUXDB_DATABASE environment variable"))?;

        let timeout = var_parsed(vars, "INFLUXDB_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INFLUXDB_TIMEOUT);

        Ok(Some(Self {
            base_url,
            database,
            username: vars("INFLUXDB_USERNAME")?,
            password: vars("INFLUXDB_PASSWORD")?.map(SecretString::from),
            timeout,
        }))
    }

    pub fn build_client(&self) -> anyhow::Result<InfluxDbClient> {
        let client = InfluxDbClient::new(self.base_url.clone(), &self.database, self.timeout)
            .context("Failed to build InfluxDB client")?;

        Ok(match (&self.username, &self.password) {
            (Some(username), password) => {
                let password = password
                    .as_ref()
                    .map(|password| password.expose_secret().to_string())
                    .unwrap_or_default();

                client.with_credentials(username, password.into())
            }
            (None, _) => client,
        })
    }
}

impl std::fmt::Debug for InfluxDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxDbConfig")
            .field("base_url", &self.base_url.as_str())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

type Vars = dyn Fn(&str) -> anyhow::Result<Option<String>>;

/// Reads an environment variable, loading the `.env` file first, and returns
/// `Ok(None)` if it is not set.
fn var(key: &str) -> anyhow::Result<Option<String>> {
    match dotenvy::var(key) {
        Ok(content) => Ok(Some(content)),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn var_parsed<R>(vars: &Vars, key: &str) -> anyhow::Result<Option<R>>
where
    R: FromStr,
    R::Err: Error + Send + Sync + 'static,
{
    match vars(key)? {
        Some(content) => Ok(Some(content.parse().with_context(|| {
            format!("Failed to parse {key} environment variable")
        })?)),
        None => Ok(None),
    }
}

/// Parses a comma-separated list. An empty variable yields an empty list.
fn list(vars: &Vars, key: &str) -> anyhow::Result<Option<Vec<String>>> {
    let values = vars(key)?.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
            .collect()
    });

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_none, assert_some};
    use insta::assert_snapshot;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> anyhow::Result<Option<String>> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();

        move |key: &str| Ok(map.get(key).cloned())
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let config = Config::from_vars(&vars(&[]))?;
        assert_none!(config.influxdb);
        assert_eq!(config.unsupported_servers, vec!["cdimage"]);
        assert_eq!(config.distro_info_csv, PathBuf::from("/usr/share/distro-info/ubuntu.csv"));
        Ok(())
    }

    #[test]
    fn test_unsupported_servers() -> anyhow::Result<()> {
        let config = Config::from_vars(&vars(&[(
            "ISO_DOWNLOADS_UNSUPPORTED_SERVERS",
            "cdimage, old-releases",
        )]))?;
        assert_eq!(config.unsupported_servers, vec!["cdimage", "old-releases"]);

        let config = Config::from_vars(&vars(&[("ISO_DOWNLOADS_UNSUPPORTED_SERVERS", "")]))?;
        assert!(config.unsupported_servers.is_empty());
        Ok(())
    }

    #[test]
    fn test_influxdb() -> anyhow::Result<()> {
        let config = InfluxDbConfig::from_vars(&vars(&[
            ("INFLUXDB_HOSTNAME", "influx.internal"),
            ("INFLUXDB_DATABASE", "metrics"),
            ("INFLUXDB_USERNAME", "iso"),
            ("INFLUXDB_PASSWORD", "hunter2"),
        ]))?;

        let config = assert_some!(config);
        assert_eq!(config.base_url.as_str(), "http://influx.internal:8086/");
        assert_eq!(config.database, "metrics");
        assert_eq!(config.username.as_deref(), Some("iso"));
        let password = assert_some!(config.password.as_ref());
        assert_eq!(password.expose_secret(), "hunter2");
        assert_eq!(config.timeout, Duration::from_secs(30));

        assert_snapshot!(format!("{config:?}"), @r#"InfluxDbConfig { base_url: "http://influx.internal:8086/", database: "metrics", username: Some("iso"), timeout: 30s, .. }"#);
        Ok(())
    }

    #[test]
    fn test_influxdb_port_and_timeout() -> anyhow::Result<()> {
        let config = InfluxDbConfig::from_vars(&vars(&[
            ("INFLUXDB_HOSTNAME", "localhost"),
            ("INFLUXDB_PORT", "9999"),
            ("INFLUXDB_DATABASE", "metrics"),
            ("INFLUXDB_TIMEOUT_SECS", "5"),
        ]))?;

        let config = assert_some!(config);
        assert_eq!(config.base_url.as_str(), "http://localhost:9999/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_none!(config.username);
        Ok(())
    }

    #[test]
    fn test_influxdb_errors() {
        let error = InfluxDbConfig::from_vars(&vars(&[("INFLUXDB_HOSTNAME", "localhost")]))
            .unwrap_err();
        assert_snapshot!(error, @"Failed to find required INFLUXDB_DATABASE environment variable");

        let error = InfluxDbConfig::from_vars(&vars(&[
            ("INFLUXDB_HOSTNAME", "localhost"),
            ("INFLUXDB_PORT", "http"),
            ("INFLUXDB_DATABASE", "metrics"),
        ]))
        .unwrap_err();
        assert_snapshot!(error, @"Failed to parse INFLUXDB_PORT environment variable");
    }

    #[test]
    fn test_build_client() -> anyhow::Result<()> {
        let config = InfluxDbConfig::from_vars(&vars(&[
            ("INFLUXDB_HOSTNAME", "localhost"),
            ("INFLUXDB_DATABASE", "metrics"),
        ]))?;

        let config = assert_some!(config);
        config.build_client()?;
        Ok(())
    }
}
