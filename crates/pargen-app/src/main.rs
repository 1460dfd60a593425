use std::{process, sync::Arc};

use tokio::sync::watch;
use tracing_subscriber::{filter::LevelFilter, fmt};

use pargen_app::cli::{Cli, Commands, JobsCommands};
use pargen_app::error::AppError;
use pargen_app::services::jobs::ReportJobStatus;
use pargen_app::services::{build_context, run_worker, ReportJobStore};
use pargen_app::{config, paths::AppPaths, server};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.command.as_ref() {
        Some(Commands::Serve(_)) | Some(Commands::Worker(_)) => match cli.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
        Some(Commands::Jobs(_)) | None => match cli.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Commands::Serve(_)) => {
            let config = config::load()?;
            let ctx = build_context(config)?;
            server::serve(ctx).await?;
        }
        Some(Commands::Worker(_)) => {
            run_standalone_worker().await?;
        }
        Some(Commands::Jobs(args)) => match args.command {
            JobsCommands::Status => jobs_status()?,
        },
        None => {
            Cli::print_help();
        }
    }

    Ok(())
}

async fn run_standalone_worker() -> Result<(), AppError> {
    let config = config::load()?;
    let ctx = Arc::new(build_context(config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to capture Ctrl+C signal");
        }
        let _ = shutdown_tx.send(true);
    });

    run_worker(ctx, shutdown_rx).await;
    Ok(())
}

fn jobs_status() -> Result<(), AppError> {
    let config = config::load()?;
    let paths = AppPaths::new(&config.storage.path)?;
    let store = ReportJobStore::open(&paths)?;

    let pending = store.count_by_status(ReportJobStatus::Pending)?;
    let running = store.count_by_status(ReportJobStatus::Running)?;
    let succeeded = store.count_by_status(ReportJobStatus::Succeeded)?;
    let failed = store.count_by_status(ReportJobStatus::Failed)?;

    println!("job_status\tcount");
    println!("pending\t{pending}");
    println!("running\t{running}");
    println!("succeeded\t{succeeded}");
    println!("failed\t{failed}");

    Ok(())
}
