//! leasegen CLI: run workers and manage the work table.

use leasegen::config::Config;
use leasegen::config::secrets::ExposeSecret;
use leasegen::db::{Db, LeaseTable};
use leasegen::lease::{LeaseManager, LeaseStore};
use leasegen::llm::{GenerationInvoker, PromptTemplate, RigProvider, anthropic_client};
use leasegen::model::{Status, WorkId, WorkerIdentity};
use leasegen::parse::ResultParser;
use leasegen::telemetry::{TelemetryConfig, init_telemetry};
use leasegen::worker::{ItemPipeline, LoopMode, WorkerPool};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "leasegen", about = "Lease-based LLM work-queue workers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a pool of workers until the queue drains (bounded) or Ctrl-C
    Run {
        /// Number of concurrent workers (overrides WORKER_POOL_SIZE)
        #[arg(long)]
        workers: Option<usize>,
        /// Exit each worker after this many consecutive empty polls
        /// (overrides MAX_EMPTY_POLLS)
        #[arg(long)]
        max_empty_polls: Option<u32>,
    },
    /// Clear stale leases once
    Reclaim,
    /// Work item operations
    Work {
        #[command(subcommand)]
        action: WorkAction,
    },
}

#[derive(Subcommand)]
enum WorkAction {
    /// Submit a new work item
    Submit {
        /// JSON payload (a bare string is stored as a JSON string)
        payload: String,
    },
    /// List work items
    List {
        /// Filter by status (pending, done, failed)
        #[arg(long)]
        status: Option<String>,
        /// Maximum items to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a work item
    Show {
        id: WorkId,
    },
    /// Return failed items to the queue
    Requeue {
        #[arg(required = true)]
        ids: Vec<WorkId>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run {
            workers,
            max_empty_polls,
        } => cmd_run(config, workers, max_empty_polls).await,
        Command::Reclaim => {
            let db = connect(&config).await?;
            cmd_reclaim(&config, db).await
        }
        Command::Work { action } => {
            let db = connect(&config).await?;
            match action {
                WorkAction::Submit { payload } => cmd_work_submit(&db, payload).await,
                WorkAction::List { status, limit } => cmd_work_list(&db, status, limit).await,
                WorkAction::Show { id } => cmd_work_show(&db, id).await,
                WorkAction::Requeue { ids } => cmd_work_requeue(&db, ids).await,
            }
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<Db> {
    let db = Db::connect(config.database_url.expose_secret())
        .await?
        .with_table(LeaseTable::named(&config.work_table))?;
    db.migrate().await?;
    Ok(db)
}

async fn cmd_run(
    mut config: Config,
    workers: Option<usize>,
    max_empty_polls: Option<u32>,
) -> anyhow::Result<()> {
    if max_empty_polls.is_some() {
        config.max_empty_polls = max_empty_polls;
    }
    let worker_count = workers.unwrap_or(config.pool_size);

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "leasegen".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let api_key = config
        .anthropic_api_key
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY is required to run workers"))?;
    let provider = RigProvider::new(anthropic_client(api_key)?);
    let invoker = GenerationInvoker::new(Arc::new(provider), config.retry.clone());

    let template = match config.prompt_file {
        Some(ref path) => PromptTemplate::load(path)?,
        None => PromptTemplate::default(),
    };
    let pipeline = ItemPipeline::new(invoker, config.model.clone())
        .template(template)
        .parser(ResultParser::new().with_required_keys(config.required_result_keys.clone()))
        .sampling(config.sampling);

    let db = connect(&config).await?;
    let worker_config = config.worker_config();
    if let LoopMode::Bounded { max_empty_polls } = worker_config.mode {
        tracing::info!(max_empty_polls, "bounded mode");
    }

    let mut pool = WorkerPool::new(
        Arc::new(db),
        Arc::new(pipeline),
        worker_config,
        config.lease_ttl,
    );
    if let Some(ref base) = config.worker_id {
        pool = pool.base_id(base);
    }

    let shutdown = pool.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown requested");
        shutdown.shutdown();
    });

    let summary = pool.run(worker_count).await;

    println!(
        "{} worker(s): {} done, {} failed, {} uncommitted, {} poll(s)",
        summary.workers.len(),
        summary.succeeded(),
        summary.failed(),
        summary.uncommitted(),
        summary.polls()
    );
    if summary.crashed > 0 {
        anyhow::bail!("{} worker(s) crashed", summary.crashed);
    }
    Ok(())
}

async fn cmd_reclaim(config: &Config, db: Db) -> anyhow::Result<()> {
    let store: Arc<dyn LeaseStore> = Arc::new(db);
    let lease = LeaseManager::new(store, WorkerIdentity::generate("operator"), config.lease_ttl);
    let cleared = lease.reclaim_stale().await?;
    println!("Reclaimed {cleared} stale lease(s).");
    Ok(())
}

async fn cmd_work_submit(db: &Db, payload: String) -> anyhow::Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&payload).unwrap_or(serde_json::Value::String(payload));

    let item = db.submit_work(payload).await?;
    println!("Created: {} (status: {})", item.id, item.status);
    Ok(())
}

async fn cmd_work_list(db: &Db, status: Option<String>, limit: i64) -> anyhow::Result<()> {
    let status_filter: Option<Status> = match status {
        Some(s) => Some(s.parse()?),
        None => None,
    };

    let items = db.list_work_items(status_filter, limit).await?;

    if items.is_empty() {
        println!("No work items found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<8}  {:<28}  {:<16}  PAYLOAD",
        "ID", "STATUS", "LEASE", "UPDATED"
    );
    println!("{}", "-".repeat(100));

    for item in &items {
        let lease = item
            .lease
            .as_ref()
            .map(|l| l.owner.to_string())
            .unwrap_or_else(|| "-".to_string());
        let payload = item.payload.to_string();
        let payload_display: String = payload.chars().take(30).collect();
        println!(
            "{:<8}  {:<8}  {:<28}  {:<16}  {}",
            item.id,
            item.status,
            lease,
            item.updated_at.format("%Y-%m-%d %H:%M"),
            payload_display
        );
    }

    println!("\n{} item(s)", items.len());
    Ok(())
}

async fn cmd_work_show(db: &Db, id: WorkId) -> anyhow::Result<()> {
    let item = db.get_work_item(id).await?;

    println!("ID:         {}", item.id);
    println!("Status:     {}", item.status);
    println!("Payload:    {}", serde_json::to_string_pretty(&item.payload)?);
    match item.lease {
        Some(ref lease) => {
            println!("Lease:      {} since {}", lease.owner, lease.acquired_at);
        }
        None => println!("Lease:      -"),
    }
    println!("Created:    {}", item.created_at);
    println!("Updated:    {}", item.updated_at);
    if let Some(ref result) = item.result {
        println!("---");
        println!("Result:     {}", serde_json::to_string_pretty(result)?);
    }
    if let Some(ref err) = item.error {
        println!("Error:      {err}");
    }

    Ok(())
}

async fn cmd_work_requeue(db: &Db, ids: Vec<WorkId>) -> anyhow::Result<()> {
    for id in ids {
        match db.requeue_failed(id).await {
            Ok(item) => println!("Requeued: {} (status: {})", item.id, item.status),
            Err(e) => eprintln!("Skipped {id}: {e}"),
        }
    }
    Ok(())
}
