use anyhow::{bail, Context};
use hb_engine::{
    write_history_csv, write_history_json, write_report_json, CheckpointStore, CheckpointedObjectiveFactory,
    RunnerConfig, SyntheticTrainerFactory,
};
use hb_optimizer::{HistoryLog, Hyperband, RunStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = match std::env::args().nth(1).or_else(|| std::env::var("HB_CONFIG").ok()) {
        Some(path) => RunnerConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => {
            info!("No config file given, using defaults");
            RunnerConfig::default()
        }
    };
    config.apply_env()?;

    let homedir = config.scheduler.homedir.clone();
    std::fs::create_dir_all(&homedir).with_context(|| format!("creating {}", homedir.display()))?;
    if config.clean_checkpoints {
        CheckpointStore::new(&homedir)?.clear()?;
    }

    let factory = CheckpointedObjectiveFactory::new(SyntheticTrainerFactory::new(config.trainer.clone()));
    let mut hyperband = Hyperband::new(config.scheduler.clone(), config.search_space(), factory)?;
    let mut history = HistoryLog::new();
    let report = hyperband.run_report(&mut history);

    write_history_csv(&history, homedir.join("history.csv"))?;
    write_history_json(&history, homedir.join("history.json"))?;
    write_report_json(&report, homedir.join("report.json"))?;

    if report.status == RunStatus::Failed {
        bail!("run {} failed: {}", report.id, report.error.as_deref().unwrap_or("unknown error"));
    }

    match &report.best.configuration {
        Some(best) => {
            info!("Best configuration {} with metric {:.4}", best, report.best.metric);
            println!("{}", serde_json::to_string_pretty(&report.best)?);
        }
        None => warn!("Run finished without a finite metric"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
