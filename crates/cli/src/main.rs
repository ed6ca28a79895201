use crate::{
    commands::{Commands, CounterAction},
    env::EnvManager,
    error::CliError,
    shutdown::ShutdownCoordinator,
};
use clap::Parser;
use connectors::{adapter::Adapter, manager::ConnectionManager};
use consecutive::{service::ConsecutiveService, store::SledCounterStore, sweeper::ReservationSweeper};
use engine_config::{
    store::{execution::SledExecutionStore, mapping::SledMappingStore},
    validation,
};
use engine_core::execution::engine::{DocumentEngine, EngineParams};
use model::{execution::record::ExecutionStatus, mapping::Mapping};
use std::{path::PathBuf, process, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "traspaso", version = "0.1.0", about = "Document transfer engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(code) => code,
        Err(CliError::ShutdownRequested) => {
            info!("Stopped on user request");
            130
        }
        Err(err) => {
            tracing::error!("Application error: {err}");
            1
        }
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<i32, CliError> {
    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    ShutdownCoordinator::new(cancel.clone()).register_handlers();

    match cli.command {
        Commands::Run {
            mapping,
            ids,
            ids_file,
            servers,
            data_dir,
        } => run_mapping(mapping, ids, ids_file, servers, data_dir, cancel).await,
        Commands::Validate { mapping } => {
            let definition = load_mapping(&mapping)?;
            let findings = validation::validate_mapping(&definition);
            output::print_findings(&findings);
            Ok(if validation::has_errors(&findings) { 1 } else { 0 })
        }
        Commands::Counter { action, data_dir } => counter_command(action, data_dir).await,
        Commands::Ping { url } => {
            let adapter = Adapter::connect(&url).await?;
            adapter.get().ping().await.map_err(|e| CliError::Connector(e.into()))?;
            println!("ok");
            Ok(0)
        }
        Commands::Executions {
            mapping_id,
            data_dir,
        } => {
            let store = SledExecutionStore::open(state_dir(data_dir)?.join("executions"))?;
            let records = store.list_for_mapping(&mapping_id)?;
            output::print_executions(&records);
            Ok(0)
        }
    }
}

async fn run_mapping(
    mapping_path: PathBuf,
    ids: Option<String>,
    ids_file: Option<PathBuf>,
    servers: Vec<String>,
    data_dir: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<i32, CliError> {
    let definition = load_mapping(&mapping_path)?;
    let document_ids = read_document_ids(ids, ids_file)?;
    let env = EnvManager::from_args(&servers)?;

    let state = state_dir(data_dir)?;
    let mappings = Arc::new(SledMappingStore::open(state.join("mappings"))?);
    mappings.save_mapping(&definition)?;
    let executions = Arc::new(SledExecutionStore::open(state.join("executions"))?);

    let connections = ConnectionManager::new();
    for key in [&definition.source_server, &definition.target_server] {
        connections.add_server(key, &env.resolve(key)?);
    }

    let counter_store = Arc::new(SledCounterStore::open(state.join("counters"))?);
    let counters = Arc::new(ConsecutiveService::new(counter_store));
    let sweeper_cancel = cancel.child_token();
    let sweeper_task =
        ReservationSweeper::new(counters.clone()).spawn(sweeper_cancel.clone());

    let engine = DocumentEngine::new(EngineParams {
        mappings,
        executions,
        connections,
        counters: Some(counters),
    });

    let result = engine
        .process_documents(&definition.id, document_ids, cancel.clone())
        .await?;
    output::print_result(&result);

    sweeper_cancel.cancel();
    let _ = sweeper_task.await;

    match result.status {
        ExecutionStatus::Cancelled => Err(CliError::ShutdownRequested),
        ExecutionStatus::Completed => Ok(0),
        ExecutionStatus::Partial => Ok(2),
        _ => Ok(1),
    }
}

async fn counter_command(
    action: CounterAction,
    data_dir: Option<PathBuf>,
) -> Result<i32, CliError> {
    let store = Arc::new(SledCounterStore::open(state_dir(data_dir)?.join("counters"))?);
    let service = ConsecutiveService::new(store);

    match action {
        CounterAction::Show { name } => {
            let doc = service.get(&name).await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        CounterAction::Reset {
            name,
            value,
            segment,
        } => {
            service.reset(&name, value, segment.as_deref()).await?;
            println!("counter '{name}' reset to {value}");
        }
        CounterAction::Metrics { name } => {
            let metrics = service
                .metrics(&name, Duration::from_secs(24 * 3600))
                .await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        CounterAction::Sweep { name } => {
            let swept = service.sweep_expired(&name, chrono::Utc::now()).await?;
            println!("{swept} reservation(s) reclaimed");
        }
    }
    Ok(0)
}

fn load_mapping(path: &PathBuf) -> Result<Mapping, CliError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn read_document_ids(
    ids: Option<String>,
    ids_file: Option<PathBuf>,
) -> Result<Vec<String>, CliError> {
    let ids = match (ids, ids_file) {
        (Some(list), _) => list
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        (None, Some(path)) => std::fs::read_to_string(path)?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
        (None, None) => Vec::new(),
    };
    Ok(ids)
}

fn state_dir(data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(dir) = data_dir {
        return Ok(dir);
    }
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::State("could not determine home directory".to_string()))?;
    Ok(home.join(".traspaso"))
}
