//! graft CLI - Main entry point

mod inspect;
mod shell;

use clap::{Parser, Subcommand};
use graft_core::{
    FnHandler, HostRouting, ModuleContextManager, ModuleManagement, RequestRouter, RouteTable,
    TypeCatalog,
};
use graft_foundation::GraftConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// graft - hot-load and unload modules into a running host
#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: merged global + project config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the directory modules are staged into
    #[arg(long)]
    load_path: Option<PathBuf>,

    /// Module archives to load on startup
    #[arg(short, long = "module")]
    modules: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive host shell (default)
    Shell,
    /// List the units of an artifact without loading it
    Inspect {
        /// Artifact directory or zip/jar archive
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Some(Command::Inspect { path }) = &args.command {
        return inspect::run(path);
    }

    // Load configuration
    let mut config = match &args.config {
        Some(path) => GraftConfig::load_file(path)?,
        None => GraftConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}", e);
            GraftConfig::default()
        }),
    };
    if let Some(load_path) = args.load_path {
        config = config.with_load_path(load_path);
    }
    tracing::info!(
        "Starting {} (load path: {}, identity mode: {})",
        config.name,
        config.load_path.display(),
        config.intercept.identity_mode
    );

    let manager = ModuleContextManager::new(config, Arc::new(TypeCatalog::with_builtins()))?;
    let router = RequestRouter::new(manager.clone()).with_host_routing(host_routing());
    let management = ModuleManagement::new(manager.clone());

    for module in &args.modules {
        println!("{}", management.load_module(module).await);
    }

    shell::run(&management, &router).await?;

    for (identity, e) in manager.unload_all().await {
        eprintln!("unload module fail: {}, {}", identity, e);
    }
    Ok(())
}

/// 모듈이 처리하지 않는 요청용 호스트 라우트
fn host_routing() -> HostRouting {
    HostRouting::new().with_mapping(Arc::new(
        RouteTable::new("host")
            .route("GET", "/", FnHandler::text("graft host"))
            .route("GET", "/health", FnHandler::text("ok")),
    ))
}
