use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tomato_stage::{config::Config, web::serve, ClassifyOutcome, StagePipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tomato-stage")]
#[command(about = "Tomato plant growth stage classifier with care instructions")]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service with the upload page
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:7860")]
        bind: String,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Enable development mode
        #[arg(long)]
        dev: bool,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Classify a single image and print the probabilities
    Predict {
        /// Image file to classify
        image: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(ClapArgs)]
struct ModelArgs {
    /// Model directory path
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// Model file name inside the models directory
    #[arg(long)]
    model_file: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Serve {
            bind,
            workers,
            dev,
            model,
        } => {
            tracing::info!("Starting tomato stage service...");
            tracing::info!("Bind address: {}", bind);
            tracing::info!("Models directory: {}", model.models_dir);

            let config = Config::new(bind, model.models_dir, model.model_file, workers, dev)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.workers)
                .enable_all()
                .build()?;
            runtime.block_on(serve(config))?;
        }
        Command::Predict { image, model } => {
            let config = Config::new(
                "127.0.0.1:0".to_string(),
                model.models_dir,
                model.model_file,
                Some(1),
                false,
            )?;
            predict(&config, &image)?;
        }
    }

    Ok(())
}

fn predict(config: &Config, image: &Path) -> Result<()> {
    let pipeline = StagePipeline::from_config(config);

    match pipeline.classify(Some(image))? {
        ClassifyOutcome::Predicted(result) => {
            let probabilities: Vec<f32> = result
                .per_class_confidences
                .iter()
                .map(|c| c.confidence)
                .collect();
            println!("Prediction probabilities: {:?}", probabilities);
            println!(
                "The model predicts this plant is in the: {} ({:.1}%)",
                result.predicted_label,
                result.confidence * 100.0
            );
            println!("{}", result.care.title);
            Ok(())
        }
        ClassifyOutcome::ModelUnavailable { reason } => bail!("model unavailable: {}", reason),
        ClassifyOutcome::NoInput => bail!("no image provided"),
        ClassifyOutcome::ImageRejected { message, .. } => {
            bail!("could not process image: {}", message)
        }
        ClassifyOutcome::InferenceFailed { message } => bail!("inference failed: {}", message),
    }
}
