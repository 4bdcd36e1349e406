//! algoai: programming mentor chat backend.
//! classify → assemble → complete → format → persist.

use std::sync::Arc;

use algoai::format::{Formatter, FormatterConfig};
use algoai::llm::LlmConfig;
use algoai::prompt::{Persona, PromptAssembler, DEFAULT_HISTORY_LIMIT};
use algoai::{api, db, AppState, SharedDB};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "algoai", version, about = "Programming mentor chat backend")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "10000", env = "PORT")]
    port: u16,

    /// SQLite database path
    #[arg(short, long, default_value = "algoai.db", env = "ALGOAI_DB")]
    db: String,

    /// Prior turns included in each prompt
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT, env = "ALGOAI_HISTORY_LIMIT")]
    history_limit: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let chat_db = match db::ChatDB::open(&args.db) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, db = %args.db, "failed to open database");
            std::process::exit(1);
        }
    };
    let shared: SharedDB = Arc::new(chat_db);

    let llm_cfg = LlmConfig::from_env();
    let llm_status = match &llm_cfg {
        Some(cfg) => format!("model={}", cfg.model),
        None => {
            warn!("no completion key set (ALGOAI_LLM_KEY / GROQ_API_KEY), replies will carry an error");
            "disabled".into()
        }
    };

    let persona = Persona::from_env();
    let formatter = Formatter::new(FormatterConfig::from_env(&persona.name));
    let fence_policy = formatter.config().fence_policy;
    let assembler = PromptAssembler::new(persona, args.history_limit);

    let state = AppState::new(shared, llm_cfg, assembler, formatter);
    let app = api::router(state);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        db = %args.db,
        llm = %llm_status,
        history_limit = args.history_limit,
        fence_policy = ?fence_policy,
        "algoai starting"
    );

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %addr, "failed to bind address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down");
}
