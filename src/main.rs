use clap::Parser;
use port_forward_sync::config::cli::LogFormat;
use port_forward_sync::core::parser::KeyValueParser;
use port_forward_sync::utils::error::ErrorSeverity;
use port_forward_sync::utils::{logger, validation::Validate};
use port_forward_sync::{
    load_port_records, CliConfig, Command, EdgeOsClient, PortForwarder, PortRecord, RunSettings,
    TomlConfig,
};
use std::fs::File;
use std::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting port-forward-sync");

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::debug!("Effective settings: {:?}", settings);

    match run(settings).await {
        Ok(()) => {
            tracing::info!("✅ Done");
        }
        Err(e) => {
            tracing::error!(
                "❌ Operation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 130,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn load_settings(cli: &CliConfig) -> port_forward_sync::Result<RunSettings> {
    let toml = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            let config = TomlConfig::from_file(path)?;
            config.validate()?;
            Some(config)
        }
        None => None,
    };

    let settings = RunSettings::resolve(cli, toml.as_ref())?;
    settings.credentials.validate()?;
    Ok(settings)
}

fn load_ports(path: &str) -> port_forward_sync::Result<Vec<PortRecord>> {
    tracing::info!("📄 Reading desired rules from: {}", path);
    let file = File::open(path)?;
    let records = KeyValueParser::new(BufReader::new(file)).parse()?;

    let batch = load_port_records(&records);
    if let Some(first) = batch.failures.into_iter().next() {
        // 有任何一行無法解析就不送出，避免部分套用
        return Err(first);
    }

    tracing::info!("Loaded {} rule(s)", batch.records.len());
    Ok(batch.records)
}

async fn run(settings: RunSettings) -> port_forward_sync::Result<()> {
    let ports = if settings.command.needs_ports_file() {
        load_ports(&settings.ports_file)?
    } else {
        Vec::new()
    };

    let client = EdgeOsClient::new(settings.credentials.clone(), settings.client_options.clone())?;
    client.login().await?;

    let forwarder = PortForwarder::new(client)
        .with_readiness(settings.readiness)
        .with_retry(settings.retry)
        .with_mode(settings.mode);

    let token = forwarder.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, cancelling");
            token.cancel();
        }
    });

    match settings.command {
        Command::Add => {
            let added = forwarder.add_ports(&ports).await?;
            println!("✅ Added {} rule(s)", added);
        }
        Command::Remove => {
            let removed = forwarder.remove_ports(&ports).await?;
            println!("✅ Removed {} rule(s)", removed);
        }
        Command::RemoveAll => {
            let removed = forwarder.remove_all_ports().await?;
            println!("✅ Removed all {} rule(s)", removed);
        }
        Command::Replace => {
            let removed = forwarder.remove_all_ports().await?;
            println!("✅ Removed all {} rule(s)", removed);
            let added = forwarder.add_ports(&ports).await.inspect_err(|_| {
                tracing::error!("❌ Rules were cleared but re-adding failed");
            })?;
            println!("✅ Added {} rule(s)", added);
        }
        Command::Sync => {
            let summary = forwarder.sync_ports(&ports).await?;
            println!(
                "✅ Sync complete: {} added, {} removed, {} left untouched",
                summary.added, summary.removed, summary.unmatchable
            );
        }
        Command::List => {
            let live = forwarder.forwarded_ports().await?;
            for port in &live {
                println!("{}", port);
            }
            println!("{} rule(s)", live.len());
        }
    }

    Ok(())
}
