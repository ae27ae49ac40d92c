use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{builder::PossibleValuesParser, Arg, Command};
use config::Config;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::{error::Error, log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings};

/// location of the config file if none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "/app/config/config.yaml";

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Everything the relay needs to know, loaded once at startup.
///
/// Field names in the config file keep the camelCase keys of existing
/// deployments, lower-cased spellings are accepted as well.
#[serde_as]
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// `:8080`, `8080` or a full socket address
    pub port: String,
    #[serde(rename = "sslEnabled", alias = "sslenabled", default)]
    pub ssl_enabled: bool,
    #[serde(rename = "sslKeyFileName", alias = "sslkeyfilename", default)]
    pub ssl_key_file_name: Option<String>,
    #[serde(rename = "sslCertFileName", alias = "sslcertfilename", default)]
    pub ssl_cert_file_name: Option<String>,
    #[serde(rename = "gitlabURL", alias = "gitlaburl")]
    pub gitlab_url: String,
    #[serde(rename = "gitlabAPIPrefix", alias = "gitlabapiprefix")]
    pub gitlab_api_prefix: String,
    #[serde(rename = "gitlabAccessToken", alias = "gitlabaccesstoken")]
    pub gitlab_access_token: String,
    #[serde(rename = "gitlabProjectID", alias = "gitlabprojectid")]
    pub gitlab_project_id: String,
    /// verify the certificate of the gitlab instance. off unless asked for,
    /// existing deployments talk to instances with self signed certificates
    #[serde(rename = "tlsVerify", alias = "tlsverify", default)]
    pub tls_verify: bool,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(
        rename = "requestTimeout",
        alias = "requesttimeout",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(rename = "telemetryEndpoint", alias = "telemetryendpoint", default)]
    pub telemetry_endpoint: Option<TelemetryEndpointSettings>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("port", &self.port)
            .field("ssl_enabled", &self.ssl_enabled)
            .field("ssl_key_file_name", &self.ssl_key_file_name)
            .field("ssl_cert_file_name", &self.ssl_cert_file_name)
            .field("gitlab_url", &self.gitlab_url)
            .field("gitlab_api_prefix", &self.gitlab_api_prefix)
            .field("gitlab_access_token", &"<redacted>")
            .field("gitlab_project_id", &self.gitlab_project_id)
            .field("tls_verify", &self.tls_verify)
            .field("request_timeout", &self.request_timeout)
            .field("log", &self.log)
            .field("telemetry_endpoint", &self.telemetry_endpoint)
            .finish()
    }
}

impl Settings {
    /// parse command line arguments and load the config file they point to
    pub fn load() -> Result<Self> {
        let opts = Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .author(clap::crate_authors!())
            .args([
                Arg::new("config")
                    .help("path of config file")
                    .short('c')
                    .long("config")
                    .default_value(DEFAULT_CONFIG_PATH),
                Arg::new("level")
                    .help("log level")
                    .value_parser(PossibleValuesParser::new([
                        "error", "warn", "info", "debug", "trace",
                    ]))
                    .ignore_case(true)
                    .long("log"),
            ])
            .get_matches();

        let config_path = opts
            .get_one::<String>("config")
            .context("no config path given")?;

        let mut settings = Self::from_file(config_path)
            .with_context(|| format!("can't load config from {config_path}"))?;

        if let Some(level) = opts.get_one::<String>("level") {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }

    /// load and validate settings from a config file, the format is picked by
    /// the file extension
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let conf = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Self::from_config(conf)
    }

    pub fn from_config(conf: Config) -> crate::error::Result<Self> {
        let settings: Settings = conf.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.listen_addr()?;

        if self.ssl_enabled && self.tls_files().is_none() {
            return Err(Error::Config(
                "sslEnabled requires sslCertFileName and sslKeyFileName".to_string(),
            ));
        }

        Ok(())
    }

    /// address the webhook receiver binds to
    pub fn listen_addr(&self) -> crate::error::Result<SocketAddr> {
        let port = self.port.trim();
        let all_interfaces = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

        // `:8080` listens on every interface
        if let Ok(port) = port.strip_prefix(':').unwrap_or(port).parse::<u16>() {
            return Ok(SocketAddr::new(all_interfaces, port));
        }

        port.parse::<SocketAddr>()
            .map_err(|err| Error::Config(format!("invalid port {:?}: {err}", self.port)))
    }

    /// certificate and key file, if both are configured
    pub fn tls_files(&self) -> Option<(&str, &str)> {
        match (&self.ssl_cert_file_name, &self.ssl_key_file_name) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => {
                Some((cert.as_str(), key.as_str()))
            }
            _ => None,
        }
    }

    /// endpoint issues are created at. segments are joined verbatim, they have
    /// to be valid url segments already
    pub fn issues_url(&self) -> String {
        format!(
            "{}{}{}/issues",
            self.gitlab_url, self.gitlab_api_prefix, self.gitlab_project_id
        )
    }
}

#[cfg(test)]
mod tests {
    use config::{File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> crate::error::Result<Settings> {
        let conf = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;

        Settings::from_config(conf)
    }

    const MINIMAL: &str = r#"
port: ":8080"
sslEnabled: false
gitlabURL: "https://gitlab.example.com"
gitlabAPIPrefix: "/api/v4/projects/"
gitlabAccessToken: "secret-token"
gitlabProjectID: "42"
"#;

    #[test]
    fn parses_reference_config() {
        let settings = parse(MINIMAL).unwrap();

        assert!(!settings.ssl_enabled);
        assert!(!settings.tls_verify);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.log.level, "info");
        assert!(settings.telemetry_endpoint.is_none());
        assert_eq!(
            settings.issues_url(),
            "https://gitlab.example.com/api/v4/projects/42/issues"
        );
        assert_eq!(
            settings.listen_addr().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn parses_optional_keys() {
        let yaml = format!(
            "{MINIMAL}tlsVerify: true\nrequestTimeout: 2.5\nlog:\n  level: debug\ntelemetryEndpoint:\n  bindAddress: 127.0.0.1\n  port: 9090\n"
        );
        let settings = parse(&yaml).unwrap();

        assert!(settings.tls_verify);
        assert_eq!(settings.request_timeout, Duration::from_millis(2500));
        assert_eq!(settings.log.level, "debug");
        assert_eq!(
            settings.telemetry_endpoint.unwrap().to_socket_addr(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn subsecond_timeout_is_kept() {
        let settings = parse(&format!("{MINIMAL}requestTimeout: 0.4\n")).unwrap();

        assert_eq!(settings.request_timeout, Duration::from_millis(400));
        assert!(!settings.request_timeout.is_zero());
    }

    #[test]
    fn accepts_port_forms() {
        let mut settings = parse(MINIMAL).unwrap();

        settings.port = "9000".to_string();
        assert_eq!(settings.listen_addr().unwrap().port(), 9000);

        settings.port = "127.0.0.1:9001".to_string();
        assert_eq!(
            settings.listen_addr().unwrap(),
            "127.0.0.1:9001".parse::<SocketAddr>().unwrap()
        );

        settings.port = "not a port".to_string();
        assert!(matches!(settings.listen_addr(), Err(Error::Config(_))));
    }

    #[test]
    fn ssl_requires_files() {
        let yaml = MINIMAL.replace("sslEnabled: false", "sslEnabled: true");
        assert!(matches!(parse(&yaml), Err(Error::Config(_))));

        let yaml = format!("{yaml}sslCertFileName: cert.pem\nsslKeyFileName: key.pem\n");
        let settings = parse(&yaml).unwrap();
        assert_eq!(settings.tls_files(), Some(("cert.pem", "key.pem")));
    }

    #[test]
    fn missing_gitlab_keys_are_rejected() {
        assert!(matches!(parse("port: \":8080\"\n"), Err(Error::Config(_))));
    }

    #[test]
    fn debug_output_hides_token() {
        let settings = parse(MINIMAL).unwrap();

        assert!(!format!("{settings:?}").contains("secret-token"));
    }
}
