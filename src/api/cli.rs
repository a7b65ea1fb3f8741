//! Command line interface.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;

use crate::common::config::AppCfg;
use crate::common::error::{PassError, PassResult};
use crate::evaluation::{select_threshold, ThresholdOutcome};
use crate::inference::Predictor;
use crate::pipeline::{self, RegisterRequest};
use crate::tracking::{FsRegistry, FsTracker, Stage};

use super::http;

#[derive(Parser, Debug)]
#[command(name = "passcompass")]
#[command(about = "Student pass/fail prediction pipeline", version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download, clean and split the student tables
    Extract {
        /// Archive URL
        #[arg(long)]
        url: Option<String>,

        /// Root folder for dated extracts
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Search logistic regression hyperparameters with threshold tuning
    Train {
        /// Training CSV with a `pass` column
        #[arg(long)]
        data: Option<PathBuf>,

        /// Minimum validation accuracy for a saved model
        #[arg(long)]
        acc_min: Option<f64>,

        /// Number of search trials
        #[arg(long)]
        max_evals: Option<usize>,
    },

    /// Register the best run of an experiment and stage it
    Register {
        /// Experiment to search (defaults to the training experiment)
        #[arg(long)]
        experiment: Option<String>,

        /// Metric used to rank runs
        #[arg(long, default_value = "val_recall_fail_tuned")]
        metric: String,

        /// Rank ascending instead of descending
        #[arg(long)]
        lower_is_better: bool,

        /// Registered model name
        #[arg(long)]
        model_name: Option<String>,
    },

    /// Serve predictions over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Pick a decision threshold from a CSV of `label,prob_fail`
    Threshold {
        /// Input CSV with a header row
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Accuracy floor
        #[arg(short, long, default_value_t = 0.78)]
        min_accuracy: f64,
    },
}

#[derive(Debug, Deserialize)]
struct ScoredRow {
    label: u8,
    prob_fail: f64,
}

fn read_scores(path: &Path) -> PassResult<(Vec<u8>, Vec<f64>)> {
    if !path.is_file() {
        return Err(PassError::not_found(path.display().to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut labels = Vec::new();
    let mut probs = Vec::new();
    for row in reader.deserialize::<ScoredRow>() {
        let row = row?;
        labels.push(row.label);
        probs.push(row.prob_fail);
    }
    Ok((labels, probs))
}

/// Selector outcome as printed by `passcompass threshold`.
pub fn outcome_json(outcome: &ThresholdOutcome) -> serde_json::Value {
    let choice = outcome.or_fallback();
    json!({
        "status": if outcome.is_satisfied() { "selected" } else { "unsatisfiable" },
        "threshold": choice.threshold,
        "recall_negative": choice.recall_negative,
        "accuracy": choice.accuracy,
    })
}

/// Execute `command` against the loaded configuration.
pub fn run(command: Command, mut cfg: AppCfg) -> PassResult<()> {
    match command {
        Command::Extract { url, base_dir } => {
            if let Some(url) = url {
                cfg.data.url = url;
            }
            if let Some(base_dir) = base_dir {
                cfg.data.base_dir = base_dir;
            }
            let out = pipeline::extract_flow(&cfg.data)?;
            println!("{}", serde_json::to_string_pretty(&json!({
                "data_dir": out.data_dir,
                "train": out.train,
                "test": out.test,
                "stats": out.stats,
            }))?);
        }
        Command::Train {
            data,
            acc_min,
            max_evals,
        } => {
            if let Some(data) = data {
                cfg.training.data_path = data;
            }
            if let Some(acc_min) = acc_min {
                cfg.training.acc_min = acc_min;
            }
            if let Some(max_evals) = max_evals {
                cfg.training.max_evals = max_evals;
            }
            let result = pipeline::train_logreg_flow(&cfg)?;
            let best = result.best_trial();
            println!("{}", serde_json::to_string_pretty(&json!({
                "parent_run": result.parent.run_id,
                "best_run": best.run_id,
                "best_params": best.params,
                "threshold": outcome_json(&best.outcome),
                "model_saved": best.model_saved,
            }))?);
        }
        Command::Register {
            experiment,
            metric,
            lower_is_better,
            model_name,
        } => {
            if let Some(model_name) = model_name {
                cfg.registry.model_name = model_name;
            }
            let experiment = experiment.unwrap_or_else(|| cfg.training.experiment.clone());
            let request = RegisterRequest {
                experiment: &experiment,
                metric: &metric,
                higher_is_better: !lower_is_better,
                model_name: &cfg.registry.model_name,
                stage: cfg.registry.stage.parse::<Stage>()?,
            };
            let version = pipeline::register_best(
                &FsTracker::new(&cfg.tracking),
                &FsRegistry::new(&cfg.registry),
                &request,
            )?;
            println!("Model v{} set to {}.", version.version, version.stage);
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            let predictor = Predictor::load(&cfg.registry)?;
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|err| PassError::internal(format!("tokio runtime: {err}")))?;
            runtime.block_on(http::serve(&cfg.server, predictor))?;
        }
        Command::Threshold {
            input,
            min_accuracy,
        } => {
            let (labels, probs) = read_scores(&input)?;
            let outcome = select_threshold(&labels, &probs, min_accuracy)?;
            println!("{}", outcome_json(&outcome));
        }
    }
    Ok(())
}
