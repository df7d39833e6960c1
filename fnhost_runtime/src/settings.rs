// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

/// Fatal errors found while loading the configuration or binding handlers.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config invalid, missing {0}")]
    Missing(&'static str),
    #[error("config invalid, missing function name, handler or codedir")]
    MissingFunctionField,
    #[error("config invalid, handler '{0}' is not of the form module.entryPoint")]
    InvalidEntryPoint(String),
    #[error("config invalid, duplicate function '{0}'")]
    DuplicateFunction(String),
    #[error("config invalid, {0}")]
    Invalid(String),
    #[error("module '{module}' not found in '{codedir}': {reason}")]
    ModuleNotFound { module: String, codedir: String, reason: String },
    #[error("symbol '{symbol}' not exported by module '{module}'")]
    SymbolNotExported { module: String, symbol: String },
    #[error("failed to read configuration '{path}': {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Variables overriding `name`, by decreasing priority.
pub const NAME_VARIABLES: [&str; 3] = [
    "BAETYL_SERVICE_INSTANCE_NAME",
    "OPENEDGE_SERVICE_INSTANCE_NAME",
    "OPENEDGE_SERVICE_NAME",
];

/// Variables overriding `server.address`, by decreasing priority.
pub const ADDRESS_VARIABLES: [&str; 3] = [
    "BAETYL_SERVICE_INSTANCE_ADDRESS",
    "OPENEDGE_SERVICE_INSTANCE_ADDRESS",
    "OPENEDGE_SERVICE_ADDRESS",
];

pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4 * 1024 * 1024;

/// Configuration document as written by the user, every field optional.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawSettings {
    pub name: Option<String>,
    pub server: Option<RawServerSettings>,
    pub function: Option<RawFunctionSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<RawFunctionSettings>,
    pub logger: Option<RawLoggerSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawServerSettings {
    pub address: Option<String>,
    /// Shutdown deadline, in milliseconds.
    pub timeout: Option<u64>,
    pub message: Option<RawMessageSettings>,
    pub concurrent: Option<RawLimit>,
    pub ca: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawMessageSettings {
    pub length: Option<RawLimit>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawLimit {
    pub max: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawFunctionSettings {
    pub name: Option<String>,
    pub handler: Option<String>,
    pub codedir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawLoggerSettings {
    pub path: Option<String>,
    pub level: Option<String>,
}

/// Validated configuration of the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub name: String,
    pub server: ServerSettings,
    pub functions: Vec<crate::registry::FunctionSpec>,
    pub logger: LoggerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Listen address, either `host:port` or `http://host:port`.
    pub address: String,
    pub max_message_length: usize,
    /// Invocations running at once across all connections; calls above it are rejected.
    pub concurrency_limit: Option<usize>,
    /// `None` means that shutdown does not wait for in-flight invocations.
    pub timeout: Option<std::time::Duration>,
    pub tls_config: Option<fnhost_api::grpc_impl::tls_config::TlsConfig>,
}

impl ServerSettings {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            concurrency_limit: None,
            timeout: None,
            tls_config: None,
        }
    }

    pub fn server_options(&self) -> fnhost_api::grpc_impl::runtime::ServerOptions {
        fnhost_api::grpc_impl::runtime::ServerOptions {
            max_message_length: self.max_message_length,
            tls_config: self.tls_config.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerSettings {
    pub path: Option<String>,
    pub level: log::LevelFilter,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            path: None,
            level: log::LevelFilter::Info,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn limit(value: u64, field: &str) -> Result<usize, ConfigError> {
    match usize::try_from(value) {
        Ok(0) | Err(_) => Err(ConfigError::Invalid(format!("{} must be a positive number, got {}", field, value))),
        Ok(value) => Ok(value),
    }
}

pub fn parse_level(level: &str) -> Result<log::LevelFilter, ConfigError> {
    match level.trim().to_lowercase().as_str() {
        "debug" => Ok(log::LevelFilter::Debug),
        "info" => Ok(log::LevelFilter::Info),
        "warn" | "warning" => Ok(log::LevelFilter::Warn),
        "error" => Ok(log::LevelFilter::Error),
        _ => Err(ConfigError::Invalid(format!("unknown logger level '{}'", level))),
    }
}

impl RawSettings {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str::<RawSettings>(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<RawSettings>(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Replace `name` and `server.address` with the first variable set among
    /// [`NAME_VARIABLES`] and [`ADDRESS_VARIABLES`], respectively.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first_set = |variables: &[&str]| variables.iter().find_map(|var| non_empty(lookup(*var)));
        if let Some(name) = first_set(&NAME_VARIABLES) {
            log::debug!("name overridden by the environment: {}", name);
            self.name = Some(name);
        }
        if let Some(address) = first_set(&ADDRESS_VARIABLES) {
            log::debug!("server address overridden by the environment: {}", address);
            self.server.get_or_insert_with(RawServerSettings::default).address = Some(address);
        }
    }

    pub fn validate(self) -> Result<RuntimeSettings, ConfigError> {
        let name = non_empty(self.name).ok_or(ConfigError::Missing("name"))?;
        let server = self.server.ok_or(ConfigError::Missing("server"))?;
        let address = non_empty(server.address).ok_or(ConfigError::Missing("server address"))?;
        if let Err(err) = fnhost_api::util::listen_address(&address) {
            return Err(ConfigError::Invalid(err.to_string()));
        }

        let max_message_length = match server.message.and_then(|message| message.length).and_then(|length| length.max) {
            Some(max) => limit(max, "server message length max")?,
            None => DEFAULT_MAX_MESSAGE_LENGTH,
        };
        let concurrency_limit = match server.concurrent.and_then(|concurrent| concurrent.max) {
            Some(max) => Some(limit(max, "server concurrent max")?),
            None => None,
        };
        let tls_config = match (non_empty(server.cert), non_empty(server.key)) {
            (Some(cert_path), Some(key_path)) => Some(fnhost_api::grpc_impl::tls_config::TlsConfig {
                cert_path: Some(cert_path),
                key_path: Some(key_path),
                ca_path: non_empty(server.ca),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Invalid("server cert and key must be set together".to_string())),
        };

        let mut functions = vec![];
        for function in self.function.into_iter().chain(self.functions) {
            match (non_empty(function.name), non_empty(function.handler), non_empty(function.codedir)) {
                (Some(name), Some(handler), Some(codedir)) => {
                    functions.push(crate::registry::FunctionSpec { name, handler, codedir })
                }
                _ => return Err(ConfigError::MissingFunctionField),
            }
        }
        if functions.is_empty() {
            return Err(ConfigError::Missing("function"));
        }

        let logger = match self.logger {
            Some(logger) => LoggerSettings {
                path: non_empty(logger.path),
                level: match non_empty(logger.level) {
                    Some(level) => parse_level(&level)?,
                    None => log::LevelFilter::Info,
                },
            },
            None => LoggerSettings::default(),
        };

        Ok(RuntimeSettings {
            name,
            server: ServerSettings {
                address,
                max_message_length,
                concurrency_limit,
                timeout: server.timeout.map(std::time::Duration::from_millis),
                tls_config,
            },
            functions,
            logger,
        })
    }
}

/// Read the configuration document: `config` is either a path to a TOML file
/// or, when enclosed in braces, an inline JSON document.
pub fn read_settings(config: &str) -> Result<RawSettings, ConfigError> {
    let trimmed = config.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return RawSettings::from_json(trimmed);
    }
    let content = std::fs::read_to_string(config).map_err(|source| ConfigError::Read {
        path: config.to_string(),
        source,
    })?;
    RawSettings::from_toml(&content)
}

/// Read, override from the process environment, and validate.
pub fn load_settings(config: &str) -> Result<RuntimeSettings, ConfigError> {
    let mut raw = read_settings(config)?;
    raw.apply_overrides(|var| std::env::var(var).ok());
    raw.validate()
}

#[cfg(test)]
mod test {
    use super::*;

    const FULL: &str = r#"
name = "sayhi-runtime"

[server]
address = "127.0.0.1:50051"
timeout = 100
message.length.max = 1024
concurrent.max = 8

[function]
name = "sayhi"
handler = "sayhi.handler"
codedir = "var/db/fnhost/sayhi"

[[functions]]
name = "echo"
handler = "echo.handler"
codedir = "var/db/fnhost/echo"

[logger]
path = "var/log/fnhost/sayhi.log"
level = "debug"
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn full_configuration() {
        let settings = RawSettings::from_toml(FULL).unwrap().validate().unwrap();
        assert_eq!("sayhi-runtime", settings.name);
        assert_eq!("127.0.0.1:50051", settings.server.address);
        assert_eq!(Some(std::time::Duration::from_millis(100)), settings.server.timeout);
        assert_eq!(1024, settings.server.max_message_length);
        assert_eq!(Some(8), settings.server.concurrency_limit);
        assert_eq!(None, settings.server.tls_config);
        assert_eq!(
            vec!["sayhi", "echo"],
            settings.functions.iter().map(|f| f.name.as_str()).collect::<Vec<&str>>()
        );
        assert_eq!("sayhi.handler", settings.functions[0].handler);
        assert_eq!("var/db/fnhost/echo", settings.functions[1].codedir);
        assert_eq!(Some("var/log/fnhost/sayhi.log".to_string()), settings.logger.path);
        assert_eq!(log::LevelFilter::Debug, settings.logger.level);
    }

    #[test]
    fn defaults() {
        let settings = RawSettings::from_toml(
            r#"
name = "x"
server = { address = "http://0.0.0.0:50051" }
function = { name = "f", handler = "m.h", codedir = "d" }
"#,
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(DEFAULT_MAX_MESSAGE_LENGTH, settings.server.max_message_length);
        assert_eq!(None, settings.server.concurrency_limit);
        assert_eq!(None, settings.server.timeout);
        assert_eq!(LoggerSettings::default(), settings.logger);
    }

    fn validate_err(content: &str) -> String {
        RawSettings::from_toml(content).unwrap().validate().unwrap_err().to_string()
    }

    #[test]
    fn missing_fields() {
        assert_eq!("config invalid, missing name", validate_err("[server]\naddress = \"127.0.0.1:1\"\n"));
        assert_eq!("config invalid, missing name", validate_err("name = \" \"\n"));
        assert_eq!("config invalid, missing server", validate_err("name = \"x\"\n"));
        assert_eq!("config invalid, missing server address", validate_err("name = \"x\"\n[server]\ntimeout = 10\n"));
        assert_eq!(
            "config invalid, missing function",
            validate_err("name = \"x\"\n[server]\naddress = \"127.0.0.1:1\"\n")
        );
        for function in [
            "handler = \"m.h\"\ncodedir = \"d\"\n",
            "name = \"f\"\ncodedir = \"d\"\n",
            "name = \"f\"\nhandler = \"m.h\"\n",
            "name = \"\"\nhandler = \"m.h\"\ncodedir = \"d\"\n",
        ] {
            assert_eq!(
                "config invalid, missing function name, handler or codedir",
                validate_err(&format!("name = \"x\"\n[server]\naddress = \"127.0.0.1:1\"\n[function]\n{}", function))
            );
        }
    }

    #[test]
    fn invalid_values() {
        let base = "name = \"x\"\n[function]\nname = \"f\"\nhandler = \"m.h\"\ncodedir = \"d\"\n";
        assert!(validate_err(&format!("{}[server]\naddress = \"nowhere\"\n", base)).contains("invalid listen address"));
        assert!(validate_err(&format!("{}[server]\naddress = \"127.0.0.1:1\"\nconcurrent.max = 0\n", base))
            .contains("server concurrent max"));
        assert!(validate_err(&format!("{}[server]\naddress = \"127.0.0.1:1\"\ncert = \"c.pem\"\n", base))
            .contains("cert and key"));
        assert!(validate_err(&format!("{}[server]\naddress = \"127.0.0.1:1\"\n[logger]\nlevel = \"loud\"\n", base))
            .contains("unknown logger level"));
        assert!(matches!(RawSettings::from_toml("name = "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn tls_settings() {
        let settings = RawSettings::from_toml(
            r#"
name = "x"
[server]
address = "127.0.0.1:1"
ca = "ca.pem"
cert = "server.pem"
key = "server.key"
[function]
name = "f"
handler = "m.h"
codedir = "d"
"#,
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(
            Some(fnhost_api::grpc_impl::tls_config::TlsConfig {
                cert_path: Some("server.pem".to_string()),
                key_path: Some("server.key".to_string()),
                ca_path: Some("ca.pem".to_string()),
            }),
            settings.server.tls_config
        );
        assert_eq!(settings.server.tls_config, settings.server.server_options().tls_config);
    }

    #[test]
    fn environment_overrides() {
        let mut raw = RawSettings::from_toml(FULL).unwrap();
        raw.apply_overrides(no_env);
        assert_eq!(Some("sayhi-runtime".to_string()), raw.name);

        raw.apply_overrides(|var| match var {
            "OPENEDGE_SERVICE_NAME" => Some("openedge".to_string()),
            "OPENEDGE_SERVICE_INSTANCE_NAME" => Some("instance".to_string()),
            "OPENEDGE_SERVICE_ADDRESS" => Some("0.0.0.0:60000".to_string()),
            _ => None,
        });
        assert_eq!(Some("instance".to_string()), raw.name);
        let settings = raw.validate().unwrap();
        assert_eq!("0.0.0.0:60000", settings.server.address);
        assert_eq!(Some(std::time::Duration::from_millis(100)), settings.server.timeout);

        // The address alone is enough to create the server table.
        let mut raw = RawSettings::from_toml("function = { name = \"f\", handler = \"m.h\", codedir = \"d\" }\n").unwrap();
        raw.apply_overrides(|var| match var {
            "BAETYL_SERVICE_INSTANCE_NAME" => Some("baetyl".to_string()),
            "BAETYL_SERVICE_INSTANCE_ADDRESS" => Some("127.0.0.1:50060".to_string()),
            "OPENEDGE_SERVICE_ADDRESS" => Some("127.0.0.1:1".to_string()),
            _ => None,
        });
        let settings = raw.validate().unwrap();
        assert_eq!("baetyl", settings.name);
        assert_eq!("127.0.0.1:50060", settings.server.address);
    }

    #[test]
    fn read_inline_json_and_files() {
        let raw = read_settings(
            r#" {"name": "x", "server": {"address": "127.0.0.1:1"}, "function": {"name": "f", "handler": "m.h", "codedir": "d"}} "#,
        )
        .unwrap();
        assert_eq!(Some("x".to_string()), raw.name);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, FULL).unwrap();
        let raw = read_settings(path.to_str().unwrap()).unwrap();
        assert_eq!(RawSettings::from_toml(FULL).unwrap(), raw);

        match read_settings(dir.path().join("missing.toml").to_str().unwrap()) {
            Err(ConfigError::Read { path, .. }) => assert!(path.ends_with("missing.toml")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
