// ABOUTME: Layered configuration: built-in defaults, INI file, CLI flags
// ABOUTME: configparser for the INI layer, clap for the CLI layer

//! Configuration resolves in three layers, lowest to highest priority:
//! built-in [`crate::constants::defaults`], an INI file (section
//! `General`), then CLI flags.

use crate::constants::defaults;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Command-line flags.
#[derive(Debug, Parser)]
#[command(name = "eventstreamd", about = "A lightweight in-memory event-stream broker")]
pub struct Cli {
    /// Path to an INI config file.
    #[arg(short = 'c', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Path to the producer Unix domain socket.
    #[arg(short = 's', long = "socket")]
    pub socket: Option<PathBuf>,

    /// Path to a TLS private key file.
    #[arg(long = "ssl-key")]
    pub ssl_key: Option<PathBuf>,

    /// Path to a TLS certificate file.
    #[arg(long = "ssl-cert")]
    pub ssl_cert: Option<PathBuf>,

    /// HTTP listener port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Enable debug-level logging.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub socket_file: PathBuf,
    pub socket_mode: u32,
    pub socket_owner: Option<String>,
    pub socket_group: Option<String>,
    pub ssl_certificate_file: Option<PathBuf>,
    pub ssl_key_file: Option<PathBuf>,
    pub http_port: u16,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_file: PathBuf::from(defaults::SOCKET_FILE),
            socket_mode: defaults::SOCKET_MODE,
            socket_owner: None,
            socket_group: None,
            ssl_certificate_file: None,
            ssl_key_file: None,
            http_port: defaults::HTTP_PORT,
            debug: false,
        }
    }
}

impl Config {
    /// TLS is enabled iff both a certificate and a key are configured.
    #[must_use]
    pub const fn tls_enabled(&self) -> bool {
        self.ssl_certificate_file.is_some() && self.ssl_key_file.is_some()
    }

    /// Apply an INI file's `[General]` section over the current values.
    /// Unknown keys are ignored; absent keys leave the current value.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` can't be read or parsed as INI.
    pub fn apply_ini_file(mut self, path: &Path) -> anyhow::Result<Self> {
        let mut parser = configparser::ini::Ini::new();
        parser
            .load(path)
            .map_err(|error| anyhow::anyhow!("failed to parse config file {path:?}: {error}"))?;

        if let Some(value) = parser.get("General", "SocketFile") {
            self.socket_file = PathBuf::from(value);
        }
        if let Some(value) = parser.get("General", "SocketMode") {
            self.socket_mode = u32::from_str_radix(value.trim_start_matches("0o"), 8)
                .map_err(|error| anyhow::anyhow!("invalid SocketMode {value:?}: {error}"))?;
        }
        if let Some(value) = parser.get("General", "SocketOwner") {
            self.socket_owner = Some(value);
        }
        if let Some(value) = parser.get("General", "SocketGroup") {
            self.socket_group = Some(value);
        }
        if let Some(value) = parser.get("General", "SSLCertificateFile") {
            self.ssl_certificate_file = Some(PathBuf::from(value));
        }
        if let Some(value) = parser.get("General", "SSLKeyFile") {
            self.ssl_key_file = Some(PathBuf::from(value));
        }
        if let Some(value) = parser.get("General", "HTTPPort") {
            self.http_port = value
                .parse()
                .map_err(|error| anyhow::anyhow!("invalid HTTPPort {value:?}: {error}"))?;
        }
        Ok(self)
    }

    /// Apply CLI flags over the current values; only flags the user
    /// actually passed override.
    #[must_use]
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(socket) = &cli.socket {
            self.socket_file = socket.clone();
        }
        if let Some(cert) = &cli.ssl_cert {
            self.ssl_certificate_file = Some(cert.clone());
        }
        if let Some(key) = &cli.ssl_key {
            self.ssl_key_file = Some(key.clone());
        }
        if let Some(port) = cli.port {
            self.http_port = port;
        }
        self.debug = self.debug || cli.debug;
        self
    }

    /// Resolve the full configuration from parsed CLI flags: defaults,
    /// then an INI file (`--config-file`, falling back to
    /// [`defaults::DEFAULT_CONFIG_FILE`] if present on disk), then CLI
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given `--config-file` can't be
    /// read, or if a present config file fails to parse.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::default();

        let config_path = cli
            .config_file
            .clone()
            .or_else(|| {
                let default_path = PathBuf::from(defaults::DEFAULT_CONFIG_FILE);
                default_path.exists().then_some(default_path)
            });

        if let Some(path) = config_path {
            config = config.apply_ini_file(&path)?;
        }

        Ok(config.apply_cli(cli))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.socket_file, PathBuf::from("/var/run/eventstreamd.sock"));
        assert_eq!(config.socket_mode, 0o0600);
        assert_eq!(config.http_port, 8888);
        assert!(!config.tls_enabled());
    }

    #[test]
    fn tls_requires_both_cert_and_key() {
        let mut config = Config::default();
        config.ssl_certificate_file = Some(PathBuf::from("cert.pem"));
        assert!(!config.tls_enabled());
        config.ssl_key_file = Some(PathBuf::from("key.pem"));
        assert!(config.tls_enabled());
    }

    #[test]
    fn cli_overrides_only_what_was_passed() {
        let cli = Cli {
            config_file: None,
            socket: None,
            ssl_key: None,
            ssl_cert: None,
            port: Some(9999),
            debug: true,
        };
        let config = Config::default().apply_cli(&cli);
        assert_eq!(config.http_port, 9999);
        assert_eq!(config.socket_file, PathBuf::from(defaults::SOCKET_FILE));
        assert!(config.debug);
    }

    #[test]
    fn ini_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventstreamd.conf");
        std::fs::write(
            &path,
            "[General]\nSocketFile = /tmp/custom.sock\nHTTPPort = 9100\n",
        )
        .unwrap();

        let config = Config::default().apply_ini_file(&path).unwrap();
        assert_eq!(config.socket_file, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(config.http_port, 9100);
    }
}
