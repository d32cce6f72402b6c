//! `vidfactory-dispatcher`: GPU/service status and job submission CLI.
//!
//! Configuration comes from the environment (and `.env`); see
//! [`FactoryConfig::from_env`] for the variables and defaults.
//!
//! ```text
//! vidfactory-dispatcher status              # GPUs and services
//! vidfactory-dispatcher test                # engine connectivity
//! vidfactory-dispatcher generate t2i "a yacht at sunset" --seed 3
//! vidfactory-dispatcher submit workflow_api.json --prompt "a red fox"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidfactory_comfyui::runner::JobRunner;
use vidfactory_core::config::FactoryConfig;
use vidfactory_core::graph::JobGraph;
use vidfactory_core::workflow_import::{Replacements, PROMPT_KEY};
use vidfactory_core::workflows::{ImageToVideo, TextToAudio, TextToImage, TextToVideo};
use vidfactory_dispatcher::aggregator::{StatusAggregator, ENGINE_SERVICE};
use vidfactory_dispatcher::display;
use vidfactory_dispatcher::health::{HealthChecker, ServiceProbe};
use vidfactory_dispatcher::workflow_file::load_workflow;

#[derive(Debug, Parser)]
#[command(name = "vidfactory-dispatcher", version, about = "GPU job dispatcher for the video factory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show GPU and service status.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check the engine connection.
    Test,
    /// Submit a job and wait for its outputs.
    Generate {
        #[command(subcommand)]
        job: GenerateJob,
    },
    /// Queue an exported API-format workflow file and wait for its outputs.
    Submit {
        workflow: PathBuf,
        /// Text substituted for `{PROMPT}` in the workflow.
        #[arg(long)]
        prompt: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum GenerateJob {
    /// Text to video.
    T2v {
        prompt: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 65)]
        frames: u32,
        #[arg(long, default_value_t = 768)]
        width: u32,
        #[arg(long, default_value_t = 512)]
        height: u32,
    },
    /// Image to video. `image` must already be in the engine's input directory.
    I2v {
        image: String,
        prompt: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 65)]
        frames: u32,
    },
    /// Text to image.
    T2i {
        prompt: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 576)]
        height: u32,
    },
    /// Text to audio.
    T2a {
        prompt: String,
        #[arg(long)]
        seed: Option<u64>,
        /// Clip length in seconds.
        #[arg(long, default_value_t = 8)]
        duration: u32,
    },
}

impl GenerateJob {
    fn label(&self) -> &'static str {
        match self {
            GenerateJob::T2v { .. } => "TEXT->VIDEO",
            GenerateJob::I2v { .. } => "IMAGE->VIDEO",
            GenerateJob::T2i { .. } => "TEXT->IMAGE",
            GenerateJob::T2a { .. } => "TEXT->AUDIO",
        }
    }

    fn prompt(&self) -> &str {
        match self {
            GenerateJob::T2v { prompt, .. }
            | GenerateJob::I2v { prompt, .. }
            | GenerateJob::T2i { prompt, .. }
            | GenerateJob::T2a { prompt, .. } => prompt,
        }
    }

    fn build(&self) -> anyhow::Result<JobGraph> {
        let graph = match self {
            GenerateJob::T2v {
                prompt,
                seed,
                frames,
                width,
                height,
            } => TextToVideo {
                seed: *seed,
                frames: *frames,
                width: *width,
                height: *height,
                ..TextToVideo::new(prompt.as_str())
            }
            .build()?,
            GenerateJob::I2v {
                image,
                prompt,
                seed,
                frames,
            } => ImageToVideo {
                seed: *seed,
                frames: *frames,
                ..ImageToVideo::new(image.as_str(), prompt.as_str())
            }
            .build()?,
            GenerateJob::T2i {
                prompt,
                seed,
                width,
                height,
            } => TextToImage {
                seed: *seed,
                width: *width,
                height: *height,
                ..TextToImage::new(prompt.as_str())
            }
            .build()?,
            GenerateJob::T2a {
                prompt,
                seed,
                duration,
            } => TextToAudio {
                seed: *seed,
                duration_secs: *duration,
                ..TextToAudio::new(prompt.as_str())
            }
            .build()?,
        };
        Ok(graph)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidfactory_dispatcher=info,vidfactory_comfyui=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = FactoryConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Command::Status { json } => status(&config, json).await,
        Command::Test => test_engine(&config).await,
        Command::Generate { job } => generate(&config, &job).await,
        Command::Submit { workflow, prompt } => submit(&config, &workflow, prompt).await,
    }
}

async fn status(config: &FactoryConfig, json: bool) -> anyhow::Result<()> {
    let report = StatusAggregator::from_config(config).report().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", display::render_report(&report));
    }
    Ok(())
}

async fn test_engine(config: &FactoryConfig) -> anyhow::Result<()> {
    println!("Testing ComfyUI connection at {}...", config.engine_url);
    let status = HealthChecker::new(config.probe_timeout)
        .check(&ServiceProbe::engine(ENGINE_SERVICE, config.engine_url.as_str()))
        .await;
    print!("{}", display::render_engine_check(&status));

    if !status.reachable {
        anyhow::bail!("ComfyUI is not reachable");
    }
    Ok(())
}

async fn generate(config: &FactoryConfig, job: &GenerateJob) -> anyhow::Result<()> {
    let prompt: String = job.prompt().chars().take(50).collect();
    println!("[{}] {prompt}...", job.label());

    let graph = job.build().context("Could not build job graph")?;
    let runner = JobRunner::from_config(config);

    let handle = runner.submit(&graph).await.context("Submission failed")?;
    print!("{}", display::queued_line(&handle));
    std::io::stdout().flush().ok();

    let outputs = runner
        .poller()
        .wait_with(&handle, |event| {
            print!("{}", display::progress_mark(event));
            if event.is_terminal() {
                println!();
            }
            std::io::stdout().flush().ok();
        })
        .await
        .context("Job did not complete")?;

    tracing::info!(handle = %handle, files = outputs.artifacts().len(), "Generation finished");
    print!("{}", display::render_outputs(&outputs));
    Ok(())
}

async fn submit(config: &FactoryConfig, path: &Path, prompt: Option<String>) -> anyhow::Result<()> {
    let mut replacements = Replacements::new();
    if let Some(prompt) = prompt {
        replacements.insert(PROMPT_KEY.to_string(), prompt);
    }

    let graph = load_workflow(path, &replacements).await?;
    println!("[WORKFLOW] {} ({} nodes)", path.display(), graph.len());

    let runner = JobRunner::from_config(config);
    let mut announced = false;
    let (handle, outputs) = runner
        .run_with(&graph, |handle, event| {
            if !announced {
                print!("{}", display::queued_line(handle));
                announced = true;
            }
            print!("{}", display::progress_mark(event));
            if event.is_terminal() {
                println!();
            }
            std::io::stdout().flush().ok();
        })
        .await
        .context("Workflow did not complete")?;

    tracing::info!(handle = %handle, files = outputs.artifacts().len(), "Workflow finished");
    print!("{}", display::render_outputs(&outputs));
    Ok(())
}
