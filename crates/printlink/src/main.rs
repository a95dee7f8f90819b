use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{PrintService, PrinterRegistry};
use infrastructure::{AllowAllBroker, ChannelPermissionBroker, PermissionBroker, PrintlinkConfig};
use printlink::cli::{Cli, Command};
use printlink::commands::{self, PrintJob};
use printlink::prompt;

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,printlink=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!(config_dir = %cli.config_dir, "Loading configuration...");
    let config = PrintlinkConfig::load(&cli.config_dir)
        .with_context(|| format!("Invalid configuration in {}", cli.config_dir))?;

    let broker: Arc<dyn PermissionBroker> = if cli.yes {
        Arc::new(AllowAllBroker)
    } else {
        let (broker, prompts) = ChannelPermissionBroker::new();
        tokio::spawn(prompt::answer_prompts(
            prompts,
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stderr(),
        ));
        Arc::new(broker)
    };

    let registry = Arc::new(PrinterRegistry::from_config(&config, broker).await);
    let service = PrintService::new(Arc::clone(&registry));

    let result = match cli.command {
        Command::Scan { transport, json } => commands::scan(&registry, transport, json).await,
        Command::Encode { language, text, out } => {
            let data = commands::encode(language, text.as_deref());
            commands::write_encoded(&data, out.as_deref()).await
        }
        Command::Print { target, text, file, image, language, check_status } => {
            let job = match (&text, &file, &image) {
                (_, _, Some(path)) => PrintJob::Image { path, language },
                (_, Some(path), None) => PrintJob::File(path),
                (Some(text), None, None) => PrintJob::Text { text, language },
                (None, None, None) => anyhow::bail!("Nothing to print: pass --text, --file or --image"),
            };
            commands::connect(&registry, &target).await?;
            commands::print(&service, job, check_status).await
        }
        Command::TestLabel { target, language, universal } => {
            commands::connect(&registry, &target).await?;
            commands::test_label(&service, language, universal).await
        }
        Command::Status { target, json } => {
            let manager = commands::connect(&registry, &target).await?;
            commands::status(&manager, json).await
        }
        Command::Info { target } => {
            let manager = commands::connect(&registry, &target).await?;
            commands::info(&manager).await
        }
        Command::Listen { target, seconds } => {
            let manager = commands::connect(&registry, &target).await?;
            commands::listen(&manager, Duration::from_secs(seconds)).await
        }
    };

    registry.shutdown().await;
    result
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Unable to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
