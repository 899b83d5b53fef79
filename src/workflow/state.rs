use std::fmt;

use crate::classifier::ClassificationOutcome;
use crate::reward::RewardResult;

/// Where the current deposit cycle stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Submitting,
    /// Lid open for its fixed window; `reward` fills in if the points call
    /// settles before the lid closes.
    AnimatingBinOpen {
        label: String,
        reward: Option<RewardResult>,
    },
    /// Lid already closed, points call still pending.
    AwaitingReward { label: String },
    Done {
        classification: ClassificationOutcome,
        reward: Option<RewardResult>,
    },
    Error { reason: String },
}

impl InteractionState {
    /// True while a cycle owns the workflow and a new deposit must be refused.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            InteractionState::Submitting
                | InteractionState::AnimatingBinOpen { .. }
                | InteractionState::AwaitingReward { .. }
        )
    }

    pub fn is_bin_open(&self) -> bool {
        matches!(self, InteractionState::AnimatingBinOpen { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Idle",
            InteractionState::Submitting => "Submitting",
            InteractionState::AnimatingBinOpen { .. } => "AnimatingBinOpen",
            InteractionState::AwaitingReward { .. } => "AwaitingReward",
            InteractionState::Done { .. } => "Done",
            InteractionState::Error { .. } => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DepositStarted,
    Classified(ClassificationOutcome),
    RewardSettled(RewardResult),
    BinClosed,
    CycleAborted(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DepositStarted => "DepositStarted",
            Event::Classified(_) => "Classified",
            Event::RewardSettled(_) => "RewardSettled",
            Event::BinClosed => "BinClosed",
            Event::CycleAborted(_) => "CycleAborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {} is not valid in state {}", self.event, self.state)
    }
}

impl std::error::Error for TransitionError {}

pub fn transition(state: &InteractionState, event: Event) -> Result<InteractionState, TransitionError> {
    use InteractionState::*;

    let invalid = TransitionError {
        state: state.name(),
        event: event.name(),
    };

    let next = match (state, event) {
        (Idle | Done { .. } | Error { .. }, Event::DepositStarted) => Submitting,

        (Submitting, Event::Classified(outcome)) => match outcome {
            ClassificationOutcome::Accepted { label } => AnimatingBinOpen { label, reward: None },
            other => Done {
                classification: other,
                reward: None,
            },
        },

        (AnimatingBinOpen { label, reward: None }, Event::RewardSettled(result)) => AnimatingBinOpen {
            label: label.clone(),
            reward: Some(result),
        },
        (AnimatingBinOpen { label, reward: None }, Event::BinClosed) => AwaitingReward {
            label: label.clone(),
        },
        (AnimatingBinOpen { label, reward: Some(result) }, Event::BinClosed) => Done {
            classification: ClassificationOutcome::Accepted { label: label.clone() },
            reward: Some(result.clone()),
        },

        (AwaitingReward { label }, Event::RewardSettled(result)) => Done {
            classification: ClassificationOutcome::Accepted { label: label.clone() },
            reward: Some(result),
        },

        (Submitting | AnimatingBinOpen { .. } | AwaitingReward { .. }, Event::CycleAborted(reason)) => {
            Error { reason }
        }

        _ => return Err(invalid),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(label: &str) -> ClassificationOutcome {
        ClassificationOutcome::Accepted {
            label: label.to_string(),
        }
    }

    fn granted() -> RewardResult {
        RewardResult::Granted { points: 10 }
    }

    #[test]
    fn test_deposit_allowed_only_when_not_busy() {
        let ready = [
            InteractionState::Idle,
            InteractionState::Done {
                classification: ClassificationOutcome::Rejected,
                reward: None,
            },
            InteractionState::Error {
                reason: "boom".to_string(),
            },
        ];
        for state in ready {
            assert_eq!(
                transition(&state, Event::DepositStarted),
                Ok(InteractionState::Submitting)
            );
        }

        let busy = [
            InteractionState::Submitting,
            InteractionState::AnimatingBinOpen {
                label: "can".to_string(),
                reward: None,
            },
            InteractionState::AwaitingReward {
                label: "can".to_string(),
            },
        ];
        for state in busy {
            assert!(state.is_busy());
            assert!(transition(&state, Event::DepositStarted).is_err());
        }
    }

    #[test]
    fn test_rejected_and_failed_finish_immediately() {
        let rejected = transition(
            &InteractionState::Submitting,
            Event::Classified(ClassificationOutcome::Rejected),
        )
        .unwrap();
        assert_eq!(
            rejected,
            InteractionState::Done {
                classification: ClassificationOutcome::Rejected,
                reward: None
            }
        );

        let failed = ClassificationOutcome::Failed {
            reason: "offline".to_string(),
        };
        let next = transition(&InteractionState::Submitting, Event::Classified(failed.clone())).unwrap();
        assert_eq!(
            next,
            InteractionState::Done {
                classification: failed,
                reward: None
            }
        );
    }

    #[test]
    fn test_reward_before_bin_closes() {
        let open = transition(&InteractionState::Submitting, Event::Classified(accepted("can"))).unwrap();
        assert!(open.is_bin_open());

        let rewarded = transition(&open, Event::RewardSettled(granted())).unwrap();
        assert!(rewarded.is_busy());
        assert!(rewarded.is_bin_open());

        let done = transition(&rewarded, Event::BinClosed).unwrap();
        assert_eq!(
            done,
            InteractionState::Done {
                classification: accepted("can"),
                reward: Some(granted())
            }
        );
    }

    #[test]
    fn test_bin_closes_before_reward() {
        let open = transition(&InteractionState::Submitting, Event::Classified(accepted("can"))).unwrap();
        let waiting = transition(&open, Event::BinClosed).unwrap();
        assert_eq!(
            waiting,
            InteractionState::AwaitingReward {
                label: "can".to_string()
            }
        );
        assert!(!waiting.is_bin_open());

        let failure = RewardResult::Failed {
            reason: "server responded with 500".to_string(),
        };
        let done = transition(&waiting, Event::RewardSettled(failure.clone())).unwrap();
        assert_eq!(
            done,
            InteractionState::Done {
                classification: accepted("can"),
                reward: Some(failure)
            }
        );
    }

    #[test]
    fn test_invalid_events_are_rejected() {
        assert!(transition(&InteractionState::Idle, Event::BinClosed).is_err());
        assert!(transition(&InteractionState::Idle, Event::RewardSettled(granted())).is_err());
        assert!(transition(&InteractionState::Submitting, Event::RewardSettled(granted())).is_err());

        let rewarded = InteractionState::AnimatingBinOpen {
            label: "can".to_string(),
            reward: Some(granted()),
        };
        let err = transition(&rewarded, Event::RewardSettled(granted())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "event RewardSettled is not valid in state AnimatingBinOpen"
        );
    }

    #[test]
    fn test_abort_moves_to_error() {
        let next = transition(
            &InteractionState::Submitting,
            Event::CycleAborted("task panicked".to_string()),
        )
        .unwrap();
        assert_eq!(
            next,
            InteractionState::Error {
                reason: "task panicked".to_string()
            }
        );
        assert!(!next.is_busy());
        assert!(transition(&InteractionState::Idle, Event::CycleAborted("x".to_string())).is_err());
    }
}
