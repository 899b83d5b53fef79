use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::bin_actuator::BinActuator;
use crate::capture::{CaptureStage, PendingItem};
use crate::classifier::{ClassificationOutcome, ItemClassifier};
use crate::config::{BIN_OPEN_DURATION, REWARD_POINTS};
use crate::error::{WorkflowError, WorkflowResult};
use crate::reward::{RewardResult, RewardService};
use crate::session::IdentityResolver;

use super::state::{transition, Event, InteractionState};

/// Snapshot published to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionView {
    pub state: InteractionState,
    pub bin_open: bool,
    pub classification_message: Option<String>,
    pub reward_message: Option<String>,
    pub error_message: Option<String>,
    /// Bumped on every accepted deposit action.
    pub cycle: u64,
}

impl InteractionView {
    pub fn summary(&self) -> String {
        [&self.classification_message, &self.reward_message]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(". ")
    }

    pub fn reward(&self) -> Option<&RewardResult> {
        match &self.state {
            InteractionState::AnimatingBinOpen { reward, .. } => reward.as_ref(),
            InteractionState::Done { reward, .. } => reward.as_ref(),
            _ => None,
        }
    }
}

/// Capabilities the workflow is wired with.
pub struct Collaborators {
    pub classifier: Arc<dyn ItemClassifier>,
    pub rewards: Arc<dyn RewardService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub actuator: Arc<dyn BinActuator>,
}

/// Runs deposit cycles: classify, then open the lid and reward in parallel.
///
/// Only one cycle is ever in flight; the check and the move to `Submitting`
/// happen under the same channel lock.
#[derive(Clone)]
pub struct DisposalOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    capture: CaptureStage,
    collaborators: Collaborators,
    view: watch::Sender<InteractionView>,
}

impl DisposalOrchestrator {
    pub fn new(capture: CaptureStage, collaborators: Collaborators) -> Self {
        let (view, _) = watch::channel(InteractionView::default());
        Self {
            inner: Arc::new(Inner {
                capture,
                collaborators,
                view,
            }),
        }
    }

    pub fn capture(&self) -> &CaptureStage {
        &self.inner.capture
    }

    pub fn subscribe(&self) -> watch::Receiver<InteractionView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> InteractionView {
        self.inner.view.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.view.borrow().state.is_busy()
    }

    /// Start a cycle for the pending item. Must be called within a tokio runtime.
    ///
    /// The returned handle finishes once the cycle has settled, lid window included.
    pub fn deposit(&self) -> WorkflowResult<JoinHandle<()>> {
        let item = self.inner.begin_cycle()?;

        let inner = Arc::clone(&self.inner);
        let cycle = tokio::spawn(async move { inner.run_cycle(item).await });

        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move {
            if let Err(e) = cycle.await {
                log::error!("Deposit cycle aborted: {}", e);
                inner.apply(Event::CycleAborted(format!("Deposit failed unexpectedly: {e}")), |view| {
                    view.error_message = Some("Deposit failed unexpectedly, please try again.".to_string());
                });
            }
        }))
    }
}

impl Inner {
    fn begin_cycle(&self) -> WorkflowResult<PendingItem> {
        let mut started: WorkflowResult<PendingItem> = Err(WorkflowError::CycleInProgress);

        self.view.send_if_modified(|view| {
            if view.state.is_busy() {
                log::warn!("Deposit refused: cycle in progress ({})", view.state.name());
                return false;
            }

            let Some(item) = self.capture.pending_item() else {
                log::info!("Deposit refused: no image selected");
                view.classification_message = None;
                view.reward_message = None;
                view.error_message = Some(WorkflowError::NoImageSelected.to_string());
                started = Err(WorkflowError::NoImageSelected);
                return true;
            };

            match transition(&view.state, Event::DepositStarted) {
                Ok(next) => {
                    log::info!("{} -> {} ({})", view.state.name(), next.name(), item.file_name);
                    view.state = next;
                    view.bin_open = false;
                    view.classification_message = None;
                    view.reward_message = None;
                    view.error_message = None;
                    view.cycle += 1;
                    started = Ok(item);
                    true
                }
                Err(e) => {
                    log::warn!("Deposit refused: {}", e);
                    false
                }
            }
        });

        started
    }

    async fn run_cycle(self: Arc<Self>, item: PendingItem) {
        // No other cycle can start while this one is busy.
        let cycle = self.view.borrow().cycle;
        let outcome = self.collaborators.classifier.classify(&item).await;
        // Consumed whatever the outcome; a retry needs a fresh selection.
        self.capture.clear_consumed(&item);

        let opened_at = Instant::now();
        let message = outcome.message();
        let accepted = outcome.is_accepted();
        self.apply(Event::Classified(outcome.clone()), |view| match outcome {
            ClassificationOutcome::Accepted { .. } => {
                view.classification_message = Some(message);
                view.bin_open = true;
            }
            ClassificationOutcome::Rejected => view.classification_message = Some(message),
            ClassificationOutcome::Failed { .. } => view.error_message = Some(message),
        });

        if !accepted {
            return;
        }

        let lid = tokio::spawn(Arc::clone(&self).run_bin_window(cycle, opened_at));

        let reward = self.reward().await;
        self.apply(Event::RewardSettled(reward.clone()), |view| match &reward {
            RewardResult::Granted { .. } => view.reward_message = Some(reward.message()),
            RewardResult::Failed { .. } => view.error_message = Some(reward.message()),
        });

        if let Err(e) = lid.await {
            log::error!("Bin window task failed: {}", e);
            self.close_bin_view(cycle);
        }
    }

    async fn run_bin_window(self: Arc<Self>, cycle: u64, opened_at: Instant) {
        // The lid hardware runs beside the timer; the view follows the deadline alone.
        let actuator = Arc::clone(&self.collaborators.actuator);
        let opening = tokio::spawn(async move { actuator.open().await });

        sleep_until(opened_at + BIN_OPEN_DURATION).await;
        self.close_bin_view(cycle);

        match opening.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Failed to open bin lid: {}", e),
            Err(e) => log::error!("Bin lid open task failed: {}", e),
        }
        if let Err(e) = self.collaborators.actuator.close().await {
            log::error!("Failed to close bin lid: {}", e);
        }
    }

    /// Idempotent, and scoped to `cycle` so a late call never closes a newer cycle's bin.
    fn close_bin_view(&self, cycle: u64) {
        self.view.send_if_modified(|view| {
            if view.cycle != cycle {
                return false;
            }
            let was_open = std::mem::replace(&mut view.bin_open, false);
            match transition(&view.state, Event::BinClosed) {
                Ok(next) => {
                    log::info!("{} -> {}", view.state.name(), next.name());
                    view.state = next;
                    true
                }
                Err(e) => {
                    if was_open {
                        log::warn!("Bin closed outside a cycle: {}", e);
                    }
                    was_open
                }
            }
        });
    }

    async fn reward(&self) -> RewardResult {
        let identity = Arc::clone(&self.collaborators.identity);
        // Resolvers may touch the filesystem.
        let email = tokio::task::spawn_blocking(move || identity.resolve())
            .await
            .unwrap_or_else(|e| {
                log::error!("Identity lookup failed: {}", e);
                None
            });
        let Some(email) = email else {
            log::warn!("No user identity available, skipping reward call");
            return RewardResult::Failed {
                reason: WorkflowError::IdentityMissing.to_string(),
            };
        };

        match self.collaborators.rewards.give_points(&email, REWARD_POINTS).await {
            Ok(()) => RewardResult::Granted {
                points: REWARD_POINTS,
            },
            Err(e) => {
                log::warn!("Reward call for {} failed: {}", email, e);
                RewardResult::Failed {
                    reason: format!("Failed to reward points: {}", WorkflowError::from(e)),
                }
            }
        }
    }

    fn apply(&self, event: Event, annotate: impl FnOnce(&mut InteractionView)) {
        self.view.send_if_modified(|view| match transition(&view.state, event) {
            Ok(next) => {
                log::info!("{} -> {}", view.state.name(), next.name());
                view.state = next;
                annotate(view);
                true
            }
            Err(e) => {
                log::warn!("Ignoring workflow event: {}", e);
                false
            }
        });
    }
}
