use crate::adapters::edgeos::ClientOptions;
use crate::config::credentials::Credentials;
use crate::config::toml_config::TomlConfig;
use crate::core::policy::{ReadinessPolicy, RetryPolicy};
use crate::core::reconciler::CommitMode;
use crate::utils::error::{Result, SyncError};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORTS_FILE: &str = "ports.txt";
pub const DEFAULT_CREDENTIALS_FILE: &str = "config.txt";

#[derive(Debug, Clone, Parser)]
#[command(name = "port-forward-sync")]
#[command(about = "Synchronize port forwarding rules onto an EdgeOS router")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Key/value file with the desired rules (default: ports.txt)
    #[arg(short, long, global = true)]
    pub ports: Option<String>,

    /// Key/value file with router_ip, username and password (default: config.txt)
    #[arg(long, global = true)]
    pub credentials: Option<String>,

    /// Seconds between polls while the router has not published its rules
    #[arg(long, global = true)]
    pub readiness_interval: Option<u64>,

    /// Maximum number of polls before giving up on the router
    #[arg(long, global = true)]
    pub readiness_attempts: Option<u32>,

    /// Overall deadline in seconds for the readiness wait
    #[arg(long, global = true)]
    pub readiness_deadline: Option<u64>,

    /// Maximum fetch attempts on transient network errors
    #[arg(long, global = true)]
    pub retry_attempts: Option<u32>,

    /// Accept the router's self-signed TLS certificate
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Compute the changes without committing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Add the rules from the ports file that are not on the router yet
    Add,
    /// Remove the rules listed in the ports file from the router
    Remove,
    /// Remove every port forwarding rule from the router
    RemoveAll,
    /// Remove every rule, then add the rules from the ports file
    Replace,
    /// Make the router hold exactly the rules from the ports file, in one commit
    Sync,
    /// Print the rules currently on the router
    List,
}

impl Command {
    pub fn needs_ports_file(&self) -> bool {
        !matches!(self, Command::RemoveAll | Command::List)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Effective settings after merging CLI flags, the TOML file and defaults,
/// in that order of precedence.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub command: Command,
    pub ports_file: String,
    pub credentials: Credentials,
    pub readiness: ReadinessPolicy,
    pub retry: RetryPolicy,
    pub client_options: ClientOptions,
    pub mode: CommitMode,
}

impl RunSettings {
    pub fn resolve(cli: &CliConfig, toml: Option<&TomlConfig>) -> Result<Self> {
        let toml_default = TomlConfig::default();
        let toml = toml.unwrap_or(&toml_default);

        let ports_file = cli
            .ports
            .clone()
            .or_else(|| toml.ports_file().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PORTS_FILE.to_string());

        let explicit_credentials = cli
            .credentials
            .clone()
            .or_else(|| toml.credentials_file().map(str::to_string));
        let mut credentials = match &explicit_credentials {
            Some(path) => Credentials::from_file(path).map_err(|e| SyncError::ConfigError {
                message: format!("cannot read credentials file '{}': {}", path, e),
            })?,
            None if Path::new(DEFAULT_CREDENTIALS_FILE).exists() => {
                Credentials::from_file(DEFAULT_CREDENTIALS_FILE)?
            }
            None => Credentials::default(),
        };
        toml.apply_credential_overrides(&mut credentials);

        let mut readiness = toml.readiness_policy();
        if let Some(interval) = cli.readiness_interval {
            readiness.interval = Duration::from_secs(interval);
        }
        if let Some(attempts) = cli.readiness_attempts {
            readiness.max_attempts = attempts;
        }
        if let Some(deadline) = cli.readiness_deadline {
            readiness.deadline = Some(Duration::from_secs(deadline));
        }

        let mut retry = toml.retry_policy();
        if let Some(attempts) = cli.retry_attempts {
            retry.max_attempts = attempts;
        }

        let mut client_options = toml.client_options();
        if cli.insecure {
            client_options.accept_invalid_certs = true;
        }

        Ok(Self {
            command: cli.command.clone().unwrap_or(Command::Replace),
            ports_file,
            credentials,
            readiness,
            retry,
            client_options,
            mode: if cli.dry_run {
                CommitMode::DryRun
            } else {
                CommitMode::Apply
            },
        })
    }
}
