use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rand::Rng;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Interval between processing indicator ticks.
const TICK: Duration = Duration::from_millis(200);
/// The indicator never passes this percentage before `finish`.
pub const PROGRESS_CEILING: f64 = 95.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
    Quiet,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    /// No stderr output at all; used by tests and `--ui quiet`.
    pub fn quiet() -> Self {
        Self::new(UiMode::Quiet, false, true)
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            Some("quiet") => UiMode::Quiet,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain | UiMode::Quiet => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner), true)
        } else if self.mode == UiMode::Quiet {
            StageGuard::new(name.to_string(), None, false)
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None, true)
        }
    }

    /// Start the processing indicator.
    ///
    /// The bar creeps toward `PROGRESS_CEILING` on its own; there is no real
    /// progress signal from the server.
    pub fn processing(&self, label: &str) -> ProcessingIndicator {
        let bar = if self.use_pretty() {
            let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        } else {
            if self.mode != UiMode::Quiet {
                eprintln!("==> {}", label);
            }
            ProgressBar::hidden()
        };
        bar.set_message(label.to_string());
        ProcessingIndicator::start(bar)
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    report: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>, report: bool) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            report,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else if self.report {
            eprintln!("{message}");
        }
    }
}

/// Monotonic progress that approaches the ceiling without reaching it.
#[derive(Clone, Copy, Debug, Default)]
pub struct AsymptoticProgress {
    value: f64,
}

impl AsymptoticProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close `fraction` (0..1) of the remaining gap to the ceiling.
    pub fn advance(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.value += (PROGRESS_CEILING - self.value) * fraction;
        if self.value > PROGRESS_CEILING {
            self.value = PROGRESS_CEILING;
        }
    }

    pub fn percent(&self) -> f64 {
        self.value
    }
}

/// Running processing indicator. Stops on `finish` or drop.
pub struct ProcessingIndicator {
    bar: ProgressBar,
    stop: Option<Sender<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl ProcessingIndicator {
    fn start(bar: ProgressBar) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let ticking = bar.clone();
        let ticker = std::thread::spawn(move || {
            let mut progress = AsymptoticProgress::new();
            let mut rng = rand::thread_rng();
            loop {
                match stop_rx.recv_timeout(TICK) {
                    Err(RecvTimeoutError::Timeout) => {
                        progress.advance(rng.gen_range(0.05..0.20));
                        ticking.set_position(progress.percent() as u64);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            bar,
            stop: Some(stop_tx),
            ticker: Some(ticker),
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
    }

    /// Jump to 100 % and remove the bar.
    pub fn finish(mut self) {
        self.stop_ticker();
        self.bar.set_position(100);
        self.bar.finish_and_clear();
    }
}

impl Drop for ProcessingIndicator {
    fn drop(&mut self) {
        self.stop_ticker();
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
