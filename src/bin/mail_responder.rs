use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{info, warn};

use mail_responder::auth::{token_manager::TokenManager, token_store};
use mail_responder::config::{Settings, load_config, load_env_file};
use mail_responder::daemon::{DaemonConfig, run_daemon};
use mail_responder::llm::openai::OpenAiClient;
use mail_responder::mail::gmail::GmailClient;
use mail_responder::pipeline::{Pipeline, PipelineConfig};
use mail_responder::store::open_ledger;

#[derive(Parser)]
#[command(name = "mail_responder")]
#[command(about = "Answers unread support mail with drafted replies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process unread mail once and exit (default)
    Run,

    /// Keep polling until interrupted
    Watch {
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    let env_problem = load_env_file(None);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Some(e) = env_problem {
        warn!("ignoring .env: {e}");
    }

    let cli = Cli::parse();

    match cli.cmd.unwrap_or(Command::Run) {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Run => with_pipeline(|pipeline| {
            let report = pipeline.run_once()?;
            info!("run finished: {report}");
            Ok(())
        }),

        Command::Watch { interval } => with_pipeline(|pipeline| {
            run_daemon(
                pipeline,
                DaemonConfig {
                    interval_secs: interval,
                },
            )
        }),
    }
}

fn load_settings() -> Result<Settings> {
    load_config()
        .and_then(|cfg| cfg.resolve())
        .map_err(|e| anyhow!("Configuration error: {e}"))
}

fn with_pipeline(f: impl FnOnce(&Pipeline<'_>) -> Result<()>) -> Result<()> {
    let settings = load_settings()?;

    let token_mgr = TokenManager::from_settings(&settings)?;
    let gmail = GmailClient::new(token_mgr);
    let llm = OpenAiClient::new(settings.openai.clone());
    let ledger = open_ledger(settings.ledger_path.as_deref())?;
    let cfg = PipelineConfig::from(&settings);

    info!(
        "acting as {} with query '{}', replies to {:?}",
        cfg.mailbox, cfg.query, cfg.routing
    );

    let pipeline = Pipeline::new(&gmail, &llm, ledger.as_ref(), &cfg);
    f(&pipeline)
}
