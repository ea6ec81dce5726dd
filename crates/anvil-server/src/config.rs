//! Server configuration.
//!
//! Built once at startup and shared read-only with every request.

use std::path::PathBuf;
use std::time::Duration;

use anvil_core::toolchain::DEFAULT_PROGRAM;
use anvil_core::{CompilerConfig, ToolchainConfig};

use crate::error::{ServerError, ServerResult};

/// Default request body limit (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Required `x-api-key` value. `None` disables the check.
    pub api_key: Option<String>,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// Compile pipeline settings.
    pub compiler: CompilerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: None,
            body_limit: DEFAULT_BODY_LIMIT,
            compiler: CompilerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `HOST` | bind address |
    /// | `PORT` | listen port |
    /// | `API_KEY` | required `x-api-key`; empty disables the check |
    /// | `ARDUINO_CLI` | toolchain program, resolved on `PATH` |
    /// | `ARDUINO_CLI_ARGS` | whitespace-separated args placed before every subcommand |
    /// | `ANVIL_WORKSPACE_ROOT` | directory for per-request workspaces |
    /// | `COMPILE_TIMEOUT_SECS` | kill toolchain invocations after this many seconds |
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.trim().parse().map_err(|_| ServerError::Config {
                key: "PORT",
                message: format!("not a valid port: {port}"),
            })?,
            None => defaults.port,
        };

        let timeout = match var("COMPILE_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs.trim().parse().map_err(|_| ServerError::Config {
                    key: "COMPILE_TIMEOUT_SECS",
                    message: format!("not a whole number of seconds: {secs}"),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let program = match var("ARDUINO_CLI") {
            Some(program) => ToolchainConfig::resolve_program(program.trim()),
            None => ToolchainConfig::resolve_program(DEFAULT_PROGRAM),
        };

        let global_args = var("ARDUINO_CLI_ARGS")
            .map(|args| args.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let workspace_root = var("ANVIL_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.compiler.workspace_root);

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            // Whitespace is a (strange) key, not an absent one.
            api_key: lookup("API_KEY").filter(|key| !key.is_empty()),
            body_limit: defaults.body_limit,
            compiler: CompilerConfig {
                workspace_root,
                toolchain: ToolchainConfig {
                    program,
                    global_args,
                    timeout,
                    ..defaults.compiler.toolchain
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.api_key.is_none());
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
        assert!(config.compiler.toolchain.timeout.is_none());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.api_key.is_none());
        assert!(config.compiler.toolchain.global_args.is_empty());
        assert!(config.compiler.toolchain.timeout.is_none());
    }

    #[test]
    fn test_empty_api_key_disables_auth() {
        let config = ServerConfig::from_lookup(lookup(&[("API_KEY", "")])).unwrap();
        assert!(config.api_key.is_none());

        let config = ServerConfig::from_lookup(lookup(&[("API_KEY", "s3cret")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_whitespace_api_key_is_enforced() {
        let config = ServerConfig::from_lookup(lookup(&[("API_KEY", "   ")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("   "));

        let state = crate::app_state(&config);
        assert_eq!(state.api_key.as_deref(), Some("   "));
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("ARDUINO_CLI", "/opt/arduino/arduino-cli"),
            ("ARDUINO_CLI_ARGS", "--config-file /etc/arduino-cli.yaml"),
            ("ANVIL_WORKSPACE_ROOT", "/var/tmp/anvil"),
            ("COMPILE_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(
            config.compiler.toolchain.program,
            PathBuf::from("/opt/arduino/arduino-cli")
        );
        assert_eq!(
            config.compiler.toolchain.global_args,
            vec!["--config-file", "/etc/arduino-cli.yaml"]
        );
        assert_eq!(config.compiler.workspace_root, PathBuf::from("/var/tmp/anvil"));
        assert_eq!(
            config.compiler.toolchain.timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config =
            ServerConfig::from_lookup(lookup(&[("COMPILE_TIMEOUT_SECS", "0")])).unwrap();
        assert!(config.compiler.toolchain.timeout.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ServerError::Config { key: "PORT", .. }));

        let err =
            ServerConfig::from_lookup(lookup(&[("COMPILE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ServerError::Config {
                key: "COMPILE_TIMEOUT_SECS",
                ..
            }
        ));
    }
}
