//! detect - command line front end
//!
//! `run` processes one image and exits, `shell` keeps an interactive session
//! open, `health` checks the service. Configuration comes from
//! `ClientConfig::load_with`; flags (or their `DETECT_*` env fallbacks) win over
//! the config file.

use std::io::{BufReader, IsTerminal};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::config::{ClientConfig, ConfigOverrides};
use crate::controller::{Controller, ControllerOptions};
use crate::detect::service_for_url;
use crate::error::UNEXPECTED_ERROR_MESSAGE;
use crate::export;
use crate::health::ModelStatus;
use crate::notify::ConsoleNotifier;
use crate::present::render_text;
use crate::session::Phase;
use crate::shell::Shell;
use crate::ui::Ui;

#[derive(Parser, Debug)]
#[command(name = "detect", author, version, about = "Client for an image object-detection service")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one image and print its detections
    Run {
        /// Image to process (jpeg, png, gif, bmp, tiff or webp; at most 16 MiB)
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Minimum detector score, 0..1
        #[arg(long, env = "DETECT_CONFIDENCE", value_name = "SCORE")]
        confidence: Option<f64>,
        /// Detection service base URL (http, https or stub://)
        #[arg(long, env = "DETECT_SERVER_URL", value_name = "URL")]
        server: Option<String>,
        /// Save the annotated image into the download directory
        #[arg(long)]
        download: bool,
        /// Open the annotated image in the system viewer
        #[arg(long)]
        view: bool,
        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
        /// UI mode for stderr progress (auto|plain|pretty|quiet)
        #[arg(long, default_value = "auto", value_name = "MODE")]
        ui: String,
    },

    /// Interactive session
    Shell {
        #[arg(long, env = "DETECT_CONFIDENCE", value_name = "SCORE")]
        confidence: Option<f64>,
        #[arg(long, env = "DETECT_SERVER_URL", value_name = "URL")]
        server: Option<String>,
        #[arg(long, default_value = "auto", value_name = "MODE")]
        ui: String,
    },

    /// Check the detection service and print its model status
    Health {
        #[arg(long, env = "DETECT_SERVER_URL", value_name = "URL")]
        server: Option<String>,
    },
}

pub fn run() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match std::panic::catch_unwind(AssertUnwindSafe(|| dispatch(args))) {
        Ok(outcome) => outcome,
        Err(_) => {
            log::error!("command aborted by an internal fault");
            eprintln!("✖ {}", UNEXPECTED_ERROR_MESSAGE);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn dispatch(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::Run {
            image,
            confidence,
            server,
            download,
            view,
            json,
            ui,
        } => {
            let cfg = load_config(server, confidence)?;
            let ui = ui_for(&ui);
            run_once(&cfg, ui, &image, download, view, json)
        }
        Command::Shell {
            confidence,
            server,
            ui,
        } => {
            let cfg = load_config(server, confidence)?;
            let ui = ui_for(&ui);
            let controller = build_controller(&cfg, ui, true)?;
            let mut shell = Shell::new(controller, std::io::stdout(), std::env::temp_dir(), true);
            shell.run(BufReader::new(std::io::stdin()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Health { server } => {
            let cfg = load_config(server, None)?;
            let service = service_for_url(&cfg.server_url)?;
            let status = {
                let _stage = ui_for("auto").stage("Check detection service");
                ModelStatus::from_check(&service.health())
            };
            println!("{}: {}", cfg.server_url, status);
            Ok(if status.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn load_config(server: Option<String>, confidence: Option<f64>) -> Result<ClientConfig> {
    let cfg = ClientConfig::load_with(&ConfigOverrides {
        server_url: server,
        confidence,
    })?;
    log::debug!("config: {:?}", cfg);
    Ok(cfg)
}

fn ui_for(mode: &str) -> Ui {
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    Ui::from_args(Some(mode), is_tty, !stdout_is_tty)
}

fn build_controller(cfg: &ClientConfig, ui: Ui, previews: bool) -> Result<Controller> {
    let service = service_for_url(&cfg.server_url)?;
    log::info!("detection service: {} ({})", cfg.server_url, service.name());
    let options = ControllerOptions {
        previews,
        ..ControllerOptions::from_config(cfg)
    };
    Ok(Controller::new(
        service,
        Box::new(ConsoleNotifier),
        ui,
        options,
    ))
}

fn run_once(
    cfg: &ClientConfig,
    ui: Ui,
    image: &std::path::Path,
    download: bool,
    view: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut controller = build_controller(cfg, ui, false)?;
    if controller.stage_path(image).is_err() {
        return Ok(ExitCode::FAILURE);
    }
    if controller.process().is_none() {
        return Err(anyhow!("request for {} was not started", image.display()));
    }
    controller.wait_idle(None);
    if controller.phase() != Phase::Result {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(result_view) = controller.result_view() {
        if json {
            println!("{}", serde_json::to_string_pretty(&result_view)?);
        } else {
            print!("{}", render_text(&result_view));
        }
    }

    let mut ok = true;
    if download {
        ok &= controller.download().is_some();
    }
    if view {
        match controller.open_fullscreen(&std::env::temp_dir()) {
            Some(fullscreen) => {
                if let Err(err) = export::open_in_viewer(&fullscreen.path) {
                    log::warn!("could not launch image viewer: {}", err);
                    ok = false;
                }
            }
            None => ok = false,
        }
    }
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
