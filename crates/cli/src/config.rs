use anyhow::{anyhow, Context as AnyhowContext, Result};
use buildlens_engine::{
    Assembler, GroupRules, RawGroupRule, SeverityFilters, TypeFilter, DEFAULT_BLOCKING,
};
use buildlens_protocol::DiagnosticType;
use buildlens_server::ServerConfig;
use buildlens_store::{BlockingPolicy, DEFAULT_BLOCKING_MESSAGE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_OUTPUT_PATH: &str = "dist/errorLog";

/// Reporter options, read from a JSON or TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReporterConfig {
    pub output_path: PathBuf,
    pub auto_start_server: bool,
    /// Open the dashboard in the default browser once the server is up.
    pub open_browser: bool,
    pub strict: bool,
    pub errors: ErrorOptions,
    #[serde(alias = "Warnings")]
    pub warnings: TypeFilter,
    pub error_config: ErrorConfig,
    pub server: ServerOptions,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            auto_start_server: false,
            open_browser: false,
            strict: false,
            errors: ErrorOptions::default(),
            warnings: TypeFilter::default(),
            error_config: ErrorConfig::default(),
            server: ServerOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorOptions {
    pub includes: Vec<DiagnosticType>,
    pub excludes: Vec<DiagnosticType>,
    pub blocking: Vec<DiagnosticType>,
    pub blocking_message: String,
}

impl Default for ErrorOptions {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            blocking: DEFAULT_BLOCKING.to_vec(),
            blocking_message: DEFAULT_BLOCKING_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    pub groups: Vec<RawGroupRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    pub host: String,
    pub base_port: u16,
    pub port_attempts: u16,
    pub debounce_ms: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        let defaults = ServerConfig::new(PathBuf::new());
        Self {
            host: defaults.host,
            base_port: defaults.base_port,
            port_attempts: defaults.port_attempts,
            debounce_ms: u64::try_from(defaults.debounce.as_millis()).unwrap_or(100),
        }
    }
}

impl ReporterConfig {
    /// Loads `path`, falling back to defaults when no file is given or it is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        Self::parse(&bytes).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(json_err) => {
                let utf8 =
                    std::str::from_utf8(bytes).map_err(|err| anyhow!("{json_err}; {err}"))?;
                let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                    anyhow!("Config is not valid JSON ({json_err}) or TOML ({toml_err})")
                })?;
                serde_json::to_value(toml_value)
                    .map_err(|err| anyhow!("Failed to convert TOML config to JSON: {err}"))?
            }
        };
        serde_json::from_value(value).map_err(|err| anyhow!("Config parse error: {err}"))
    }

    #[must_use]
    pub fn severity_filters(&self) -> SeverityFilters {
        SeverityFilters {
            errors: TypeFilter {
                includes: self.errors.includes.clone(),
                excludes: self.errors.excludes.clone(),
            },
            warnings: self.warnings.clone(),
        }
    }

    #[must_use]
    pub fn assembler(&self) -> Assembler {
        Assembler::new(
            GroupRules::from_raw(&self.error_config.groups),
            self.severity_filters(),
            self.errors.blocking.iter().copied(),
        )
    }

    /// Strict when the flag is passed, the config asks for it, or `node_env`
    /// is `production`.
    #[must_use]
    pub fn strict_mode(&self, flag: bool, node_env: Option<&str>) -> bool {
        flag || self.strict || node_env == Some("production")
    }

    #[must_use]
    pub fn blocking_policy(&self, strict: bool) -> BlockingPolicy {
        BlockingPolicy {
            strict,
            message: self.errors.blocking_message.clone(),
        }
    }

    #[must_use]
    pub fn server_config(&self, output_dir: &Path) -> ServerConfig {
        let mut config = ServerConfig::new(output_dir);
        config.host = self.server.host.clone();
        config.base_port = self.server.base_port;
        config.port_attempts = self.server.port_attempts;
        config.debounce = Duration::from_millis(self.server.debounce_ms);
        config
    }
}
