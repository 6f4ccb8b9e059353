mod cli;
mod config;
mod core;
mod tui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::Receiver;
use std::thread;

use clap::Parser;
use thiserror::Error;

use crate::cli::{BatchArgs, Cli, Commands};
use crate::config::{Config, ConfigError};
use crate::core::batch::{self, ScriptError, ScriptFlavor};
use crate::core::builder::CommandBuilder;
use crate::core::error::BuildError;
use crate::core::event::RunnerEvent;
use crate::core::process::FfmpegLauncher;
use crate::core::runner::JobRunner;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid job settings: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("failed to read file list {path}: {source}")]
    FileList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no input files given")]
    NoInputs,
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // the dashboard owns the terminal; a stderr subscriber would draw over it
    if !matches!(cli.command, Commands::Tui(_)) {
        init_tracing(cli.verbose);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Returns whether every file went through cleanly.
fn run(cli: Cli) -> Result<bool, AppError> {
    if let Commands::Init(args) = &cli.command {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::config_path()?,
        };
        Config::init(&path, args.force)?;
        println!("{}", path.display());
        return Ok(true);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            let (config, builder, inputs) = prepare(config, &args)?;
            let (runner, events) = new_runner(&config, builder)?;
            Ok(run_headless(runner, events, inputs))
        }
        Commands::Tui(args) => {
            let (config, builder, inputs) = prepare(config, &args)?;
            let (runner, events) = new_runner(&config, builder)?;
            tui::run(runner, events, inputs)?;
            Ok(true)
        }
        Commands::Print(args) => {
            let (_, mut builder, inputs) = prepare(config, &args)?;
            let mut clean = true;
            for input in &inputs {
                match builder.render(input) {
                    Ok(command) => println!("{}", command.command_line()),
                    Err(err) => {
                        eprintln!("{}: {err}", input.display());
                        clean = false;
                    }
                }
            }
            Ok(clean)
        }
        Commands::Script(args) => {
            let (config, mut builder, inputs) = prepare(config, &args.batch)?;
            let flavor = args.flavor.map(ScriptFlavor::from).unwrap_or_default();
            batch::write_script(&mut builder, &inputs, flavor, &config.decoder()?, &args.output)?;
            println!("{}", args.output.display());
            Ok(true)
        }
        Commands::Init(_) => Ok(true),
    }
}

fn prepare(
    mut config: Config,
    args: &BatchArgs,
) -> Result<(Config, CommandBuilder, Vec<PathBuf>), AppError> {
    args.job.apply(&mut config.job);
    let builder = config.job.to_builder(config.resolve_ffmpeg())?;

    let mut inputs = args.files.clone();
    if let Some(list) = &args.list {
        let listed = batch::read_file_list(list).map_err(|source| AppError::FileList {
            path: list.clone(),
            source,
        })?;
        inputs.extend(listed);
    }
    if inputs.is_empty() {
        return Err(AppError::NoInputs);
    }

    tracing::debug!(
        program = %builder.program().display(),
        variant = %builder.variant(),
        files = inputs.len(),
        "prepared batch"
    );
    Ok((config, builder, inputs))
}

fn new_runner(
    config: &Config,
    builder: CommandBuilder,
) -> Result<(JobRunner<FfmpegLauncher>, Receiver<RunnerEvent>), AppError> {
    let launcher = FfmpegLauncher::new(config.decoder()?);
    Ok(JobRunner::new(builder, launcher, config.log_path()))
}

fn run_headless(
    mut runner: JobRunner<FfmpegLauncher>,
    events: Receiver<RunnerEvent>,
    inputs: Vec<PathBuf>,
) -> bool {
    let printer = thread::spawn(move || {
        let mut clean = true;
        for event in events {
            match event {
                RunnerEvent::Output(line) => eprintln!("{line}"),
                RunnerEvent::JobStarted { command_line, .. } => println!(">> {command_line}"),
                RunnerEvent::JobExited { path, code } => {
                    if code != Some(0) {
                        clean = false;
                        eprintln!("{} exited with {code:?}", path.display());
                    }
                }
                RunnerEvent::JobFailed { message, .. } | RunnerEvent::Error(message) => {
                    clean = false;
                    eprintln!("error: {message}");
                }
                RunnerEvent::QueueChanged(_) => {}
                RunnerEvent::BatchComplete => break,
            }
        }
        clean
    });

    let handle = runner.handle();
    handle.enqueue(inputs);
    handle.start();
    runner.pump();
    runner.run_until_idle();
    println!("log: {}", runner.log_path().display());
    drop(runner);

    printer.join().unwrap_or(false)
}
