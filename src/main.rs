use rota::{
    auth, scheduler, Clock, ReportAggregator, Result, Scheduler, Settings, SystemClock,
    TaskStore,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rota-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // ── Settings ───────────────────────────────────────────────
    let settings = Settings::load()?;
    let rotation = settings.rotation()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Boot the store ─────────────────────────────────────────
    let store = TaskStore::open(&settings.database_path, rotation, clock.clone())?;

    let seeded = auth::ensure_roster_users(&store, &settings.roster, &settings.default_password)?;
    if seeded > 0 {
        info!(seeded, "created roster users with the default password");
    }

    let reports = ReportAggregator::new(store.clone());
    let scheduler = Scheduler::new(store.clone(), reports, clock, settings.scheduler.clone());

    // Boot counts as a start-of-month trigger whatever the date.
    scheduler.start_of_month()?;

    let tasks = store.get_current_month_tasks()?.len();
    let users = store.list_users()?.len();
    info!(
        period = %store.current_period(),
        tasks,
        users,
        "store loaded from {}",
        settings.database_path
    );

    // ── Scheduler ──────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler.run(shutdown_rx);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c, shutting down");
    }
    info!("shutting down");
    scheduler::stop(shutdown_tx, handle).await;
    Ok(())
}
