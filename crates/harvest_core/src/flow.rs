//! Transition table for interactive (click-through) downloads.
//!
//! The machine is pure: the engine performs the UI work for the current state
//! and reports what happened as a [`FlowEvent`].

use crate::SkipReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    SelectingResolution,
    Confirming,
    AwaitingFile,
    Done { file_name: String },
    TransientFail { reason: String },
    PermanentSkip { reason: SkipReason },
    /// Every attempt ended in a transient failure.
    Exhausted { attempts: u32 },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Done { .. } | FlowState::PermanentSkip { .. } | FlowState::Exhausted { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// An option carrying the quality marker was found.
    OptionMatched,
    /// Options were presented (or never appeared) without the marker.
    OptionMissing,
    /// The option was clicked and any confirmation handled.
    Confirmed,
    FileDetected(String),
    FileWaitTimedOut,
    /// A UI step failed in a way a page refresh may cure.
    InteractionFailed(String),
    /// The page was refreshed after a transient failure.
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFlow {
    state: FlowState,
    attempt: u32,
    max_attempts: u32,
}

impl DownloadFlow {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: FlowState::SelectingResolution,
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// 1-based number of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Apply an event. Events that do not fit the current state leave it
    /// unchanged.
    pub fn apply(&mut self, event: FlowEvent) -> &FlowState {
        let next = match (&self.state, event) {
            (FlowState::SelectingResolution, FlowEvent::OptionMatched) => {
                Some(FlowState::Confirming)
            }
            (FlowState::SelectingResolution, FlowEvent::OptionMissing) => {
                Some(FlowState::PermanentSkip {
                    reason: SkipReason::NoMatchingOption,
                })
            }
            (FlowState::Confirming, FlowEvent::Confirmed) => Some(FlowState::AwaitingFile),
            (FlowState::AwaitingFile, FlowEvent::FileDetected(file_name)) => {
                Some(FlowState::Done { file_name })
            }
            (FlowState::AwaitingFile, FlowEvent::FileWaitTimedOut) => {
                Some(FlowState::TransientFail {
                    reason: "downloaded file did not appear".to_string(),
                })
            }
            (
                FlowState::SelectingResolution | FlowState::Confirming | FlowState::AwaitingFile,
                FlowEvent::InteractionFailed(reason),
            ) => Some(FlowState::TransientFail { reason }),
            (FlowState::TransientFail { .. }, FlowEvent::Retry) => {
                if self.attempt < self.max_attempts {
                    self.attempt += 1;
                    Some(FlowState::SelectingResolution)
                } else {
                    Some(FlowState::Exhausted {
                        attempts: self.attempt,
                    })
                }
            }
            _ => None,
        };
        if let Some(next) = next {
            self.state = next;
        }
        &self.state
    }

    /// Terminal outcome as a skip reason, if the flow ended without a file.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match &self.state {
            FlowState::PermanentSkip { reason } => Some(reason.clone()),
            FlowState::Exhausted { attempts } => Some(SkipReason::RetriesExhausted {
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}
