//! Griot CLI - certify, verify, and reward cultural heritage content

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use griot::rewards::AwardContext;
use griot::{Args, CancelToken, ContentHash, ContentSubmission, Engine, MediaFile};

#[derive(Parser, Debug)]
#[command(name = "griot")]
#[command(about = "Certification and reward engine for cultural heritage content")]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Certify a content submission (JSON file) with optional media files
    Certify {
        /// Path to a JSON submission {id, title, content, ...}
        submission: PathBuf,
        /// Media attachments to pin alongside the metadata
        #[arg(long)]
        media: Vec<PathBuf>,
    },
    /// Verify certified content against an expected hash
    Verify {
        content_id: String,
        /// Expected content hash (64-char hex)
        expected_hash: String,
    },
    /// Distribute a reward for a contribution
    Award {
        contributor: String,
        /// Contribution type (e.g. CONTENT_UPLOAD, VERIFICATION, TRANSLATION)
        contribution_type: String,
        /// Quality factor, clamped to [1, 3]
        #[arg(long, default_value = "1.0")]
        quality: f64,
        /// Event multiplier, clamped to [1, 3]
        #[arg(long, default_value = "1.0")]
        multiplier: f64,
    },
    /// Show a contributor's cumulative reward balance
    Balance { contributor: String },
    /// Show a contributor's level standing
    Level { contributor: String },
    /// Show engine mode and per-operation metrics
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing/logging
    let log_level = cli.args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("griot={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = cli.args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Griot - Heritage Certification Engine");
    info!("======================================");
    info!("Instance: {}", cli.args.instance_id);
    info!("Backend: {:?}", cli.args.ledger_backend);

    let engine = Engine::start(&cli.args).await?;
    info!("Mode: {}", engine.mode());

    let cancel = CancelToken::never();
    match cli.command {
        Command::Certify { submission, media } => {
            let raw = std::fs::read_to_string(&submission)?;
            let submission: ContentSubmission = serde_json::from_str(&raw)?;

            let mut files = Vec::new();
            for path in media {
                let bytes = std::fs::read(&path)?;
                files.push(MediaFile {
                    bytes: bytes.into(),
                    filename: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "attachment".to_string()),
                    mime_type: mime_for(&path),
                });
            }

            let certificate = engine.certify_content(submission, files, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&certificate)?);
        }
        Command::Verify {
            content_id,
            expected_hash,
        } => {
            let expected = ContentHash::from_hex(&expected_hash)?;
            let result = engine.verify_content(&content_id, expected, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Award {
            contributor,
            contribution_type,
            quality,
            multiplier,
        } => {
            let ctx = AwardContext {
                quality,
                multiplier,
                metadata: None,
            };
            let record = engine
                .distribute_reward(&contributor, &contribution_type, ctx, &cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Balance { contributor } => {
            let balance = engine.balance_of(&contributor).await;
            println!(
                "{}",
                serde_json::json!({"contributor": contributor, "balance": balance})
            );
        }
        Command::Level { contributor } => {
            let level = engine.level_of(&contributor).await;
            println!("{}", serde_json::to_string_pretty(&level)?);
        }
        Command::Status => {
            let snapshot = engine.metrics_snapshot();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "mode": engine.mode(),
                    "operations": snapshot,
                }))?
            );
        }
    }

    Ok(())
}

/// Best-effort MIME type from a file extension
fn mime_for(path: &PathBuf) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}
