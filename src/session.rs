//! Session state machine.
//!
//! ```text
//! Empty | Staged | Processing | Result --stage--> Staged
//! Staged --begin_processing--> Processing
//! Processing --complete(Ok)--> Result
//! Processing --complete(Err)--> Staged
//! Staged | Processing | Result --reset--> Empty
//! ```
//!
//! Every request is tagged with a `Generation`. `stage` and `reset` advance
//! the generation, so a response that arrives for an older generation no
//! longer matches and is discarded instead of re-entering `Result`.

use std::fmt;

use crate::detect::DetectionResult;
use crate::input::StagedFile;

/// Default minimum detector score sent with each upload.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// Settings sent with each upload. Survive `reset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessingSettings {
    confidence_threshold: f64,
}

impl ProcessingSettings {
    pub fn new(confidence_threshold: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&confidence_threshold) {
            Some(Self {
                confidence_threshold,
            })
        } else {
            None
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Returns false and keeps the old value when `value` is outside 0..=1.
    pub fn set_confidence_threshold(&mut self, value: f64) -> bool {
        match Self::new(value) {
            Some(updated) => {
                *self = updated;
                true
            }
            None => false,
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE,
        }
    }
}

/// Tag tying a response to the session that issued its request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub enum SessionState {
    Empty,
    Staged(StagedFile),
    Processing(StagedFile),
    Result(StagedFile, Box<DetectionResult>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Staged,
    Processing,
    Result,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Empty => "empty",
            Phase::Staged => "staged",
            Phase::Processing => "processing",
            Phase::Result => "result",
        };
        f.write_str(name)
    }
}

/// Outcome of offering a response to the session.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// Response applied; the session is now `Result`.
    Applied,
    /// Failure applied; the session is back to `Staged`.
    Reverted,
    /// Response belonged to an older generation and was dropped.
    Stale,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Empty,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Empty => Phase::Empty,
            SessionState::Staged(_) => Phase::Staged,
            SessionState::Processing(_) => Phase::Processing,
            SessionState::Result(..) => Phase::Result,
        }
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    pub fn staged_file(&self) -> Option<&StagedFile> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Staged(file)
            | SessionState::Processing(file)
            | SessionState::Result(file, _) => Some(file),
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match &self.state {
            SessionState::Result(_, result) => Some(result),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, SessionState::Processing(_))
    }

    /// Replace whatever is staged. Accepted in every phase.
    pub fn stage(&mut self, file: StagedFile) -> Generation {
        self.generation += 1;
        self.state = SessionState::Staged(file);
        self.generation()
    }

    /// Enter `Processing`; `None` unless the session is `Staged`.
    pub fn begin_processing(&mut self) -> Option<(Generation, StagedFile)> {
        let file = match &self.state {
            SessionState::Staged(file) => file.clone(),
            _ => return None,
        };
        self.state = SessionState::Processing(file.clone());
        Some((self.generation(), file))
    }

    /// Apply the response of the request tagged `generation`.
    pub fn complete<E>(
        &mut self,
        generation: Generation,
        outcome: Result<DetectionResult, E>,
    ) -> Completion {
        if generation != self.generation() || !self.is_processing() {
            return Completion::Stale;
        }
        let state = std::mem::replace(&mut self.state, SessionState::Empty);
        let SessionState::Processing(file) = state else {
            self.state = state;
            return Completion::Stale;
        };
        match outcome {
            Ok(result) => {
                self.state = SessionState::Result(file, Box::new(result));
                Completion::Applied
            }
            Err(_) => {
                self.state = SessionState::Staged(file);
                Completion::Reverted
            }
        }
    }

    /// Return to `Empty`, invalidating any outstanding request.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::Empty;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
