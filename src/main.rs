//! aether-chat - Route chat prompts to Gemini or Azure OpenAI
//!
//! Calls each provider directly, or through the Aether proxy in
//! enterprise mode.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aether_chat::chat::{resolve_model, run_server};
use aether_chat::config::Config;
use aether_chat::providers::Provider;
use aether_chat::router::{Router, RoutingMode};

#[derive(Parser)]
#[command(name = "aether-chat")]
#[command(about = "Route chat prompts to Gemini or Azure OpenAI, directly or through the Aether proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Path to configuration file (environment variables if omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Send one prompt and print the reply
    Ask {
        /// Path to configuration file (environment variables if omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// LLM provider: google-generativeai or azure-openai
        #[arg(short, long)]
        provider: String,

        /// Model name (defaults to the first Gemini model or the Azure deployment)
        #[arg(short, long)]
        model: Option<String>,

        /// Route through the managed proxy
        #[arg(short, long)]
        enterprise: bool,

        /// The prompt
        prompt: String,
    },

    /// Validate configuration and show which routes have credentials
    Check {
        /// Path to configuration file (environment variables if omitted)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            tracing::info!(config = %path, "Loading configuration");
            Config::from_file(path)?
        }
        None => {
            tracing::info!("Loading configuration from environment");
            Config::from_env()?
        }
    };
    Ok(config)
}

/// Load `.env` (or `path`), its values winning over exported variables.
///
/// A missing file is fine; any other failure comes back as a warning.
fn load_dotenv(path: Option<&Path>) -> Option<String> {
    let result = match path {
        Some(path) => dotenvy::from_path_override(path),
        None => dotenvy::dotenv_override().map(|_| ()),
    };
    match result {
        Ok(()) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(format!("Failed to load .env: {}", e)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before tracing init so RUST_LOG may come from .env
    let dotenv_warning = load_dotenv(None);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aether_chat=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(warning) = dotenv_warning {
        tracing::warn!("{}", warning);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut config = load_config(config.as_deref())?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Ask {
            config,
            provider,
            model,
            enterprise,
            prompt,
        } => {
            let config = load_config(config.as_deref())?;

            // Azure defaults to the deployment; an explicit --model wins for either provider
            let model = match (model, provider.parse::<Provider>()) {
                (Some(model), _) => model,
                (None, Ok(parsed)) => resolve_model(&config, parsed, None)?,
                (None, Err(_)) => String::new(),
            };

            let http_client = reqwest::Client::builder().build()?;
            let router = Router::new(Arc::new(config.credentials), http_client);

            let reply = router.ask(&prompt, &provider, &model, enterprise).await;
            println!("{}", reply);
            Ok(())
        }

        Commands::Check { config } => {
            let config = load_config(config.as_deref())?;
            println!("Configuration OK");

            for provider in Provider::ALL {
                for mode in [RoutingMode::Direct, RoutingMode::Managed] {
                    let status = if config.credentials.has_route(provider, mode) {
                        "ready"
                    } else {
                        "missing credentials"
                    };
                    println!("  {:<20} {:<8} {}", provider, mode, status);
                }
            }

            match &config.credentials.azure_deployment {
                Some(deployment) => println!("  Azure deployment: {}", deployment),
                None => println!("  Azure deployment: not set"),
            }
            println!("  Gemini models: {}", config.chat.gemini_models.join(", "));
            Ok(())
        }
    }
}
