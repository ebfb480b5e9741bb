//! Interactive session loop.
//!
//! Reads one command per line while upload workers run in the background.
//! A reader thread forwards input lines over a channel so the loop can keep
//! applying worker reports between keystrokes.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::Result;

use crate::controller::Controller;
use crate::export;
use crate::input::{format_bytes, image_info};
use crate::present::render_text;
use crate::session::{Generation, Phase};

/// How long the loop waits for input before applying worker reports again.
const POLL: Duration = Duration::from_millis(50);

const HELP: &str = "\
Commands:
  open <path>        stage an image
  <enter> | process  upload the staged image
  confidence <0..1>  set the threshold ('confidence reset' restores 0.25)
  f                  view the annotated image full screen
  esc                close the full-screen view, else clear a shown result
  d                  download the annotated image
  reset              clear the session
  status             show the session state
  health             check the detection service
  help               show this text
  quit               leave";

#[derive(Clone, Debug, PartialEq)]
pub enum ShellCommand {
    Open(PathBuf),
    Process,
    Confidence(f64),
    ConfidenceReset,
    Fullscreen,
    Escape,
    Download,
    Reset,
    Status,
    Health,
    Help,
    Quit,
}

/// Parse one input line. Errors carry the text shown to the user.
pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "" | "process" | "p" => ShellCommand::Process,
        "open" | "o" => {
            if rest.is_empty() {
                return Err("usage: open <path>".to_string());
            }
            ShellCommand::Open(PathBuf::from(rest))
        }
        "confidence" | "c" => match rest {
            "reset" => ShellCommand::ConfidenceReset,
            value => value
                .parse()
                .map(ShellCommand::Confidence)
                .map_err(|_| "usage: confidence <0..1> | confidence reset".to_string())?,
        },
        "f" | "fullscreen" => ShellCommand::Fullscreen,
        "esc" | "escape" => ShellCommand::Escape,
        "d" | "download" => ShellCommand::Download,
        "reset" | "r" => ShellCommand::Reset,
        "status" | "s" => ShellCommand::Status,
        "health" => ShellCommand::Health,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}'; type 'help'", other)),
    };
    Ok(command)
}

pub struct Shell<W: Write> {
    controller: Controller,
    out: W,
    /// Where full-screen images are written.
    view_dir: PathBuf,
    open_viewer: bool,
    shown: Option<Generation>,
    /// Print the model status once the outstanding health check reports.
    announce_health: bool,
}

impl<W: Write> Shell<W> {
    pub fn new(controller: Controller, out: W, view_dir: PathBuf, open_viewer: bool) -> Self {
        Self {
            controller,
            out,
            view_dir,
            open_viewer,
            shown: None,
            announce_health: false,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn into_parts(self) -> (Controller, W) {
        (self.controller, self.out)
    }

    /// Run until `quit` or end of input.
    ///
    /// At end of input an outstanding request is still awaited so its
    /// result is printed.
    pub fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: BufRead + Send + 'static,
    {
        let (lines_tx, lines_rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("shell-input".to_string())
            .spawn(move || {
                for line in input.lines() {
                    let Ok(line) = line else { break };
                    if lines_tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        self.controller.spawn_health();
        self.announce_health = true;
        writeln!(self.out, "Detection service: {}", self.controller.model_status())?;
        writeln!(self.out, "Type 'help' for commands.")?;
        self.out.flush()?;

        loop {
            self.poll()?;
            match lines_rx.recv_timeout(POLL) {
                Ok(line) => {
                    if !self.handle_line(&line)? {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.controller.wait_idle(None);
        self.poll()
    }

    /// Apply worker reports, then print a result the first time it appears
    /// and a health status once its check reports.
    pub fn poll(&mut self) -> Result<()> {
        self.controller.drain_events();
        if self.announce_health && !self.controller.health_pending() {
            self.announce_health = false;
            writeln!(self.out, "Detection service: {}", self.controller.model_status())?;
            self.out.flush()?;
        }
        self.show_new_result()
    }

    fn show_new_result(&mut self) -> Result<()> {
        let generation = self.controller.session().generation();
        if self.controller.phase() != Phase::Result || self.shown == Some(generation) {
            return Ok(());
        }
        self.shown = Some(generation);
        if let Some(view) = self.controller.result_view() {
            write!(self.out, "{}", render_text(&view))?;
            if view.has_image {
                writeln!(self.out, "Press 'f' to view the annotated image or 'd' to download it.")?;
            }
            self.out.flush()?;
        }
        Ok(())
    }

    /// Handle one input line. Returns false when the session should end.
    pub fn handle_line(&mut self, line: &str) -> Result<bool> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(self.out, "{}", message)?;
                return Ok(true);
            }
        };
        log::debug!("shell command: {:?}", command);
        match command {
            ShellCommand::Open(path) => self.open(&path)?,
            ShellCommand::Process => {
                if self.controller.process().is_none() {
                    match self.controller.phase() {
                        Phase::Empty => writeln!(self.out, "No image staged; use 'open <path>'.")?,
                        Phase::Processing => writeln!(self.out, "Already processing.")?,
                        Phase::Result => {
                            writeln!(self.out, "Stage an image again to reprocess it.")?
                        }
                        Phase::Staged => {}
                    }
                }
            }
            ShellCommand::Confidence(value) => {
                if self.controller.set_confidence(value) {
                    writeln!(self.out, "Confidence threshold: {:.2}", value)?;
                }
            }
            ShellCommand::ConfidenceReset => {
                self.controller.reset_settings();
                writeln!(
                    self.out,
                    "Confidence threshold: {:.2}",
                    self.controller.settings().confidence_threshold()
                )?;
            }
            ShellCommand::Fullscreen => self.fullscreen()?,
            ShellCommand::Escape => {
                if self.controller.close_fullscreen() {
                    writeln!(self.out, "Full-screen view closed.")?;
                } else if self.controller.phase() == Phase::Result {
                    self.controller.reset();
                    self.shown = None;
                }
            }
            ShellCommand::Download => {
                if let Some(path) = self.controller.download() {
                    writeln!(self.out, "Saved {}", path.display())?;
                }
            }
            ShellCommand::Reset => {
                self.controller.reset();
                self.shown = None;
            }
            ShellCommand::Status => self.status()?,
            ShellCommand::Health => {
                if self.controller.health_pending() {
                    writeln!(self.out, "Health check already running.")?;
                } else {
                    self.controller.spawn_health();
                    self.announce_health = true;
                    writeln!(self.out, "Checking detection service...")?;
                }
            }
            ShellCommand::Help => writeln!(self.out, "{}", HELP)?,
            ShellCommand::Quit => return Ok(false),
        }
        self.out.flush()?;
        Ok(true)
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        if let Ok(staged) = self.controller.stage_path(path) {
            let info = image_info(&staged);
            writeln!(
                self.out,
                "Staged {} ({}, {})",
                info.file, info.size, info.media_type
            )?;
        }
        Ok(())
    }

    fn fullscreen(&mut self) -> Result<()> {
        let open_viewer = self.open_viewer;
        let Some(view) = self.controller.open_fullscreen(&self.view_dir) else {
            return Ok(());
        };
        writeln!(
            self.out,
            "Full-screen image {}x{} at {} ('esc' to close)",
            view.width,
            view.height,
            view.path.display()
        )?;
        if open_viewer {
            if let Err(err) = export::open_in_viewer(&view.path) {
                log::warn!("could not launch image viewer: {}", err);
            }
        }
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let controller = &self.controller;
        writeln!(self.out, "State:      {}", controller.phase())?;
        writeln!(
            self.out,
            "Confidence: {:.2}",
            controller.settings().confidence_threshold()
        )?;
        writeln!(self.out, "Service:    {}", controller.model_status())?;
        if let Some(file) = controller.session().staged_file() {
            let info = image_info(file);
            writeln!(
                self.out,
                "File:       {} ({}, {})",
                info.file,
                format_bytes(file.byte_size(), 2),
                info.media_type
            )?;
            if !info.modified.is_empty() {
                writeln!(self.out, "Modified:   {}", info.modified)?;
            }
        }
        if let Some(preview) = controller.preview() {
            writeln!(self.out, "Dimensions: {}x{}", preview.width, preview.height)?;
        }
        if controller.fullscreen().is_some() {
            writeln!(self.out, "Full-screen view open")?;
        }
        Ok(())
    }
}
