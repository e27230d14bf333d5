//! Command-line arguments for the `veritas` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use veritas_core::VeritasConfig;

/// Veritas - adaptive retrieval-augmented question answering.
#[derive(Parser, Debug)]
#[command(name = "veritas", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for conversation logs and the API token.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Answer one question and exit.
    Ask {
        question: String,
        /// Conversation owner; defaults to `general.default_user_id`.
        #[arg(short = 'u', long = "user")]
        user: Option<String>,
        /// Print progress markers and tokens as they arrive.
        #[arg(short = 's', long = "stream")]
        stream: bool,
    },
    /// Print a user's stored question/answer pairs as JSON.
    History {
        #[arg(short = 'u', long = "user")]
        user: Option<String>,
    },
    /// Write the effective configuration to the config path.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl CliArgs {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }

    /// Priority: --config flag > VERITAS_CONFIG env var > ~/.veritas/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|k| std::env::var(k).ok())
    }

    pub fn resolve_config_path_with<F>(&self, env: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env("VERITAS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > VERITAS_PORT env var > config file value.
    pub fn resolve_port_with<F>(&self, config_port: u16, env: F) -> u16
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env("VERITAS_PORT").and_then(|v| v.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Fold CLI and environment overrides into a loaded config.
    pub fn apply_to<F>(&self, config: &mut VeritasConfig, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        config.general.port = self.resolve_port_with(config.general.port, &env);
        if let Some(dir) = &self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".veritas").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".veritas").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = CliArgs::try_parse_from(["veritas"]).unwrap();
        assert_eq!(args.command(), &Command::Serve);
    }

    #[test]
    fn test_ask_parsing() {
        let args = CliArgs::try_parse_from([
            "veritas", "ask", "what is CoT?", "--user", "alice", "--stream", "-l", "debug",
        ])
        .unwrap();
        assert_eq!(
            args.command(),
            &Command::Ask {
                question: "what is CoT?".to_string(),
                user: Some("alice".to_string()),
                stream: true,
            }
        );
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_config_path_priority() {
        let args = CliArgs::try_parse_from(["veritas", "--config", "/tmp/a.toml"]).unwrap();
        let from_env = |k: &str| (k == "VERITAS_CONFIG").then(|| "/tmp/b.toml".to_string());
        assert_eq!(args.resolve_config_path_with(from_env), PathBuf::from("/tmp/a.toml"));

        let args = CliArgs::try_parse_from(["veritas"]).unwrap();
        assert_eq!(args.resolve_config_path_with(from_env), PathBuf::from("/tmp/b.toml"));
    }

    #[test]
    fn test_port_priority() {
        let env = |k: &str| (k == "VERITAS_PORT").then(|| "4000".to_string());
        let args = CliArgs::try_parse_from(["veritas", "-p", "5000"]).unwrap();
        assert_eq!(args.resolve_port_with(3030, env), 5000);

        let args = CliArgs::try_parse_from(["veritas"]).unwrap();
        assert_eq!(args.resolve_port_with(3030, env), 4000);
        assert_eq!(args.resolve_port_with(3131, no_env), 3131);
        assert_eq!(args.resolve_port_with(0, no_env), 3030);
    }

    #[test]
    fn test_apply_to_config() {
        let args =
            CliArgs::try_parse_from(["veritas", "serve", "-d", "/srv/veritas", "-l", "warn"]).unwrap();
        let mut config = VeritasConfig::default();
        args.apply_to(&mut config, no_env);
        assert_eq!(config.general.data_dir, "/srv/veritas");
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 3030);
    }
}
