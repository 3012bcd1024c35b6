use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracker::{ParameterSet, Tracker};

mod config;
mod telemetry;

use config::Config;

#[derive(Parser)]
#[command(about = "Send Measurement Protocol hits or render tracking URLs")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Post a hit to the collection endpoint
    Send(HitArgs),
    /// Print a GET tracking URL for the hit
    Url {
        #[command(flatten)]
        hit: HitArgs,
        /// Print an HTML <img> tag instead of the bare URL
        #[arg(long)]
        html: bool,
    },
    /// Print the stored client identifier, creating it if needed
    ClientId,
}

#[derive(Args)]
struct HitArgs {
    /// Hit parameter as key=value, e.g. -p ec=Installed
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl HitArgs {
    fn parameter_set(&self) -> ParameterSet {
        ParameterSet::from_pairs(self.params.iter().cloned())
    }
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let _sentry = telemetry::init(&config);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, config: &Config) -> Result<(), tracker::TrackerError> {
    let tracker = Tracker::from_config(&config.tracker)?;

    match command {
        CliCommand::Send(hit) => {
            tracker.submit_event(&hit.parameter_set()).await?;
            tracing::info!(endpoint = %tracker.endpoint(), "Hit sent");
        }
        CliCommand::Url { hit, html } => {
            let params = hit.parameter_set();
            let output = if html {
                tracker.build_tracking_image_tag(&params)?
            } else {
                tracker.build_tracking_url(&params)?
            };
            println!("{output}");
        }
        CliCommand::ClientId => {
            println!("{}", tracker.client_ids().client_id()?);
        }
    }

    Ok(())
}
