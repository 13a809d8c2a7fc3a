use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mvp_moneyball::config::PipelineConfig;
use mvp_moneyball::logging;
use mvp_moneyball::pipeline::Pipeline;
use mvp_moneyball::report;

/// NBA MVP likelihood pipeline
#[derive(Parser)]
#[command(name = "mvp_moneyball")]
#[command(about = "Assemble, clean, featurize, train, evaluate and rank NBA MVP candidates")]
struct Cli {
    /// JSON config file; defaults plus MVP_* environment overrides otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join the raw exports into one row per player season
    Assemble,
    /// Normalize names, fill gaps and rescale rates
    Clean,
    /// Build the model feature matrix
    Features,
    /// Train the scorer on the training seasons
    Train,
    /// Score the validation seasons and write the reports
    Evaluate,
    /// Rank one season with the newest saved model
    Predict {
        #[arg(long)]
        season: i32,
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Every stage from assemble through evaluate
    Run,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::Assemble => {
            let out = pipeline.assemble().context("assemble stage")?;
            println!("wrote {}", out.display());
        }
        Command::Clean => {
            let out = pipeline.clean().context("clean stage")?;
            println!("wrote {}", out.display());
        }
        Command::Features => {
            let out = pipeline.features().context("features stage")?;
            println!("wrote {}", out.display());
        }
        Command::Train => {
            let out = pipeline.train().context("train stage")?;
            println!("wrote {}", out.display());
        }
        Command::Evaluate => {
            let outputs = pipeline.evaluate().context("evaluate stage")?;
            print!("{}", report::render_text(&outputs.report, None));
            println!("wrote {}", outputs.text.display());
            println!("wrote {}", outputs.workbook.display());
        }
        Command::Predict { season, top } => {
            let (ranking, out) = pipeline
                .predict(season)
                .with_context(|| format!("predicting season {season}"))?;
            print!("{}", report::render_ranking(&ranking, top));
            println!("wrote {}", out.display());
        }
        Command::Run => {
            let outputs = pipeline.run().context("full pipeline run")?;
            print!("{}", report::render_text(&outputs.evaluation.report, None));
            println!("model {}", outputs.model.display());
            println!("report {}", outputs.evaluation.text.display());
        }
    }
    Ok(())
}
