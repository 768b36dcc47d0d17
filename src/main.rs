//! rock-id CLI — the presenter end of capture → encode → dispatch → present.

use clap::{Parser, Subcommand};
use rock_id_lib::config::{self, Settings};
use rock_id_lib::vision::{self, ProviderKind, ReqwestTransport, RockIdentification};
use rock_id_lib::IdentifyError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rock-id")]
#[command(about = "Identify rocks from photos using a hosted vision model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the rock in a photo
    Identify {
        /// Path to the photo (JPEG from the camera, PNG also accepted)
        image: PathBuf,

        /// Provider to use instead of AI_PROVIDER (openai, gemini, custom)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List providers and whether they are configured
    Providers,

    /// Test connectivity to a provider
    Check {
        /// Provider to probe (defaults to the active one)
        #[arg(short, long)]
        provider: Option<ProviderKind>,
    },

    /// List the classes reported by the custom model server
    Classes,

    /// Manage API keys in the OS keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key for openai or gemini
    Set {
        provider: ProviderKind,
        key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let dotenv = config::load_dotenv();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_level(cli.verbose)),
    )
    .init();
    if let Some(path) = dotenv {
        log::info!("[STARTUP] Loaded {}", path.display());
    }

    let settings = Settings::from_env();
    log::debug!("[STARTUP] {:?}", settings);

    let outcome = match cli.command {
        Commands::Identify {
            image,
            provider,
            json,
        } => run_identify(image, provider, json, settings).await,
        Commands::Providers => {
            print_providers(&settings);
            Ok(())
        }
        Commands::Check { provider } => run_check(provider, &settings).await,
        Commands::Classes => run_classes(&settings).await,
        Commands::Key {
            action: KeyAction::Set { provider, key },
        } => match config::save_api_key(provider, &key) {
            Ok(()) => {
                println!("Saved {} key to the OS keychain", provider);
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

/// Level used when RUST_LOG is unset.
fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

async fn run_identify(
    image: PathBuf,
    provider: Option<ProviderKind>,
    json: bool,
    mut settings: Settings,
) -> Result<(), IdentifyError> {
    if let Some(kind) = provider {
        settings.provider = Some(kind.id().to_string());
    }

    // Fail fast on configuration before reading the photo.
    vision::build_identifier(&settings)?;

    let result = vision::identify_with(&image, &settings, &ReqwestTransport::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_identification(&result);
    }
    Ok(())
}

async fn run_check(provider: Option<ProviderKind>, settings: &Settings) -> Result<(), IdentifyError> {
    let kind = match provider {
        Some(kind) => kind,
        None => vision::resolve_provider(settings)?,
    };
    let status = vision::check_provider(kind, settings, &ReqwestTransport::new()).await?;
    println!("{}: {}", kind, status);
    Ok(())
}

async fn run_classes(settings: &Settings) -> Result<(), IdentifyError> {
    let classes = vision::fetch_custom_classes(settings, &ReqwestTransport::new()).await?;
    println!("{} classes:", classes.len());
    for class in classes {
        println!("  {}", class);
    }
    Ok(())
}

fn print_providers(settings: &Settings) {
    let active = vision::resolve_provider(settings);
    for info in vision::all_providers() {
        let kind: ProviderKind = match info.id.parse() {
            Ok(kind) => kind,
            Err(_) => continue,
        };
        let marker = match &active {
            Ok(a) if *a == kind => "*",
            _ => " ",
        };
        let configured = if vision::is_provider_configured(kind, settings) {
            "configured"
        } else {
            "missing"
        };
        let model = info.default_model.as_deref().unwrap_or("-");
        println!(
            "{} {:<7} {:<30} {:<18} {} ({})",
            marker, info.id, info.name, model, info.env_key, configured
        );
    }
    if let Err(e) = active {
        println!();
        println!("Active provider: {}", e);
    }
}

fn print_identification(result: &RockIdentification) {
    println!(
        "{}  ({}, {:.0}% confidence)",
        result.name, result.rock_type, result.confidence
    );
    if !result.description.is_empty() {
        println!("{}", result.description);
    }
    if let Some(minerals) = result.minerals.as_ref().filter(|m| !m.is_empty()) {
        println!("Minerals: {}", minerals.join(", "));
    }
    if result.top_predictions.len() > 1 {
        println!("Other candidates:");
        for (i, p) in result.top_predictions.iter().enumerate().skip(1) {
            println!("  {}. {} — {:.1}%", i + 1, p.name, p.confidence);
        }
    }
}

/// Configuration problems exit 2 and point at the variable; runtime
/// failures exit 1 and say whether a retake could help.
fn report_error(e: &IdentifyError) -> ExitCode {
    if e.is_config() {
        eprintln!("Configuration error: {}", e);
        return ExitCode::from(2);
    }
    eprintln!("Could not identify this rock: {}", e);
    if e.is_retryable() {
        eprintln!("Retake the photo or try again.");
    }
    ExitCode::FAILURE
}
