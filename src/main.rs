//! Radiologix: service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Load the classifier (fails fast on a missing model)
//!   6. Build the chatbot; preload its model when configured
//!   7. Open the record store when enabled
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Serve HTTP until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use radiologix::config::{self, Config};
use radiologix::error::AppError;
use radiologix::logger;
use radiologix::subsystems::chatbot::ChatbotSubsystem;
use radiologix::subsystems::classifier::ImageClassifier;
use radiologix::subsystems::comms::{self, CommsState, OptionalRecordStore};
use radiologix::supervisor::health::HealthRegistry;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present: ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        service = %config.service_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let health = HealthRegistry::new();

    let classifier = ImageClassifier::load(&config.classifier)
        .map_err(|e| AppError::Classifier(e.to_string()))?;
    health
        .reporter("classifier")
        .set_healthy_with(
            "ready",
            Some(serde_json::json!({ "backend": classifier.backend_name() })),
        )
        .await;

    let chatbot = ChatbotSubsystem::new(
        &config.chatbot,
        &config.llm,
        config.llm_api_key.clone(),
        health.reporter("chatbot"),
    )
    .await;
    if config.chatbot.preload {
        chatbot.start();
    }

    let records = open_records(&config)?;

    // Shared shutdown token: Ctrl-C cancels it, the HTTP channel watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, classifier.backend_name(), records.is_some());

    let state = Arc::new(CommsState::new(
        Arc::new(classifier),
        config.segmentation.clone(),
        chatbot,
        records,
        health,
    ));

    comms::run(&config, state, shutdown).await?;

    let _ = { use std::io::Write as _; std::io::stderr().flush() };
    Ok(())
}

#[cfg(feature = "records")]
fn open_records(config: &Config) -> Result<OptionalRecordStore, AppError> {
    use radiologix::subsystems::records::RecordStore;

    if !config.records.enabled {
        return Ok(None);
    }
    let store = RecordStore::open(&config.work_dir)?;
    let stored = store.recent(1)?.len();
    info!(root = %store.root_dir().display(), has_records = stored > 0, "record store ready");
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "records"))]
fn open_records(config: &Config) -> Result<OptionalRecordStore, AppError> {
    if config.records.enabled {
        tracing::warn!("records enabled in config but not compiled in (feature `records`)");
    }
    Ok(None)
}

fn print_startup_summary(config: &Config, classifier_backend: &str, records: bool) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let classifier_line = match classifier_backend {
        "onnx" => format!("onnx {}", config.classifier.model_path.display()),
        other => other.to_string(),
    };
    let chatbot_line = format!(
        "provider={} model={} preload={}",
        config.llm.provider, config.llm.openai.model, config.chatbot.preload
    );
    let records_line = if records {
        format!("enabled ({})", config.work_dir.display())
    } else {
        "disabled".to_string()
    };
    let cors = if config.http.cors { "cors" } else { "no cors" };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🩻 Radiologix Service Status                                 ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧾 Service: {:<48}║", config.service_name);
    println!("║ 🧠 PID: {:<52}║", std::process::id());
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("🌐 http: {} ({cors})", config.http.bind)));
    println!("║   {}║", fit(format!("🔬 classifier: {classifier_line}")));
    println!("║   {}║", fit(format!("💬 chatbot: {chatbot_line}")));
    println!("║   {}║", fit(format!("🗄️  records: {records_line}")));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: radiologix [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs { log_level: logger::level_for_verbosity(verbosity), config_path }
}
