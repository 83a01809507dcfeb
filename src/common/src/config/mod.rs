use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Connection settings for the ClickHouse HTTP interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// HTTP(S) endpoint, e.g. `http://localhost:8123`
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Table holding the samples. Must be a non-quoted identifier.
    pub table: String,
    /// Request LZ4-compressed responses from the server
    pub compression: bool,
    /// Bound on the startup connectivity check
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:8123"),
            database: String::from("default"),
            username: String::from("default"),
            password: String::new(),
            table: String::from("metrics.samples"),
            compression: true,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Remote-read behaviour.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ReadConfig {
    /// A `name=value` label whose equality matchers are dropped from the generated SQL.
    ///
    /// Useful when Prometheus adds an external label to every remote-read query
    /// that the stored samples never carry.
    pub ignore_label: Option<String>,
    /// Always return raw timestamps, even when Prometheus sends step hints
    pub ignore_hints: bool,
    /// Upper bound for a whole remote-read request
    #[serde(default, with = "humantime_serde")]
    pub query_timeout: Option<Duration>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address the remote-read endpoint listens on
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0:9201"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub clickhouse: ClickHouseConfig,
    pub read: ReadConfig,
    pub http: HttpConfig,
}

impl Configuration {
    /// Load configuration from `promhouse.toml` in the working directory and the environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file("promhouse.toml"))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from an explicit file path and the environment.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path)).extract().map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed("PROMHOUSE__").split("__"))
    }
}

/// ClickHouse non-quoted identifier: `^[a-zA-Z_][0-9a-zA-Z_.]*$`
pub fn is_table_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert_eq!(config.clickhouse.url, "http://localhost:8123");
        assert_eq!(config.clickhouse.table, "metrics.samples");
        assert!(config.clickhouse.compression);
        assert_eq!(config.clickhouse.connect_timeout, Duration::from_secs(5));
        assert!(config.read.ignore_label.is_none());
        assert!(!config.read.ignore_hints);
        assert!(config.read.query_timeout.is_none());
        assert_eq!(config.http.bind, "0.0.0.0:9201");
    }

    #[test]
    fn test_table_identifier() {
        assert!(is_table_identifier("samples"));
        assert!(is_table_identifier("metrics.samples"));
        assert!(is_table_identifier("_tmp.samples_v2"));

        assert!(!is_table_identifier(""));
        assert!(!is_table_identifier("1samples"));
        assert!(!is_table_identifier(".samples"));
        assert!(!is_table_identifier("samples; DROP TABLE x"));
        assert!(!is_table_identifier("`samples`"));
        assert!(!is_table_identifier("metrics-samples"));
    }

    #[test]
    fn test_configless_operation() {
        Jail::expect_with(|_jail| {
            let config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(config.clickhouse.database, "default");
            assert_eq!(config.http.bind, "0.0.0.0:9201");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "promhouse.toml",
                r#"
                [clickhouse]
                url = "https://clickhouse.internal:8443"
                table = "prom.samples"
                connect_timeout = "2s"

                [read]
                ignore_label = "replica=a"
                ignore_hints = true
                query_timeout = "30s"
                "#,
            )?;

            let config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(config.clickhouse.url, "https://clickhouse.internal:8443");
            assert_eq!(config.clickhouse.table, "prom.samples");
            assert_eq!(config.clickhouse.connect_timeout, Duration::from_secs(2));
            // Untouched keys keep their defaults
            assert_eq!(config.clickhouse.username, "default");
            assert_eq!(config.read.ignore_label.as_deref(), Some("replica=a"));
            assert!(config.read.ignore_hints);
            assert_eq!(config.read.query_timeout, Some(Duration::from_secs(30)));
            Ok(())
        });
    }

    #[test]
    fn test_env_var_override() {
        Jail::expect_with(|jail| {
            jail.create_file("promhouse.toml", "[http]\nbind = \"127.0.0.1:1\"")?;
            jail.set_env("PROMHOUSE__HTTP__BIND", "127.0.0.1:9999");
            jail.set_env("PROMHOUSE__CLICKHOUSE__PASSWORD", "secret");
            jail.set_env("PROMHOUSE__READ__IGNORE_HINTS", "true");

            let config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(config.http.bind, "127.0.0.1:9999");
            assert_eq!(config.clickhouse.password, "secret");
            assert!(config.read.ignore_hints);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_explicit_path() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[clickhouse]\ndatabase = \"prometheus\"")?;

            let config = Configuration::load_from_path(Path::new("custom.toml")).map_err(|e| *e)?;
            assert_eq!(config.clickhouse.database, "prometheus");
            Ok(())
        });
    }
}
