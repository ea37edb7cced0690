use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::models::{ContributionData, ContributionPatch, Step};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    NotStarted,
    Signing,
    Uploading,
    Registering,
    RequestingProof,
    ProcessingProof,
    ClaimingReward,
    Succeeded,
    Failed,
}

impl FlowPhase {
    pub fn for_step(step: Step) -> Self {
        match step {
            Step::Upload => FlowPhase::Uploading,
            Step::BlockchainRegistration => FlowPhase::Registering,
            Step::RequestTeeProof => FlowPhase::RequestingProof,
            Step::ProcessProof => FlowPhase::ProcessingProof,
            Step::ClaimReward => FlowPhase::ClaimingReward,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(
            self,
            FlowPhase::NotStarted | FlowPhase::Succeeded | FlowPhase::Failed
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowPhase::Succeeded | FlowPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub phase: FlowPhase,
    pub current_step: u8,
    pub completed_steps: Vec<u8>,
    pub contribution_data: Option<ContributionData>,
    pub share_url: String,
    pub error: Option<String>,
    pub is_success: bool,
}

impl Default for FlowSnapshot {
    fn default() -> Self {
        Self {
            phase: FlowPhase::NotStarted,
            current_step: 0,
            completed_steps: Vec::new(),
            contribution_data: None,
            share_url: String::new(),
            error: None,
            is_success: false,
        }
    }
}

impl FlowSnapshot {
    /// True while a run is in flight; callers disable their submit trigger on this.
    pub fn is_busy(&self) -> bool {
        self.phase.is_active()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    PhaseChanged(FlowPhase),
    StepStarted(Step),
    StepCompleted(Step),
    DataMerged(ContributionPatch),
    ShareUrlSet(String),
    Failed(String),
    Succeeded,
    Reset,
}

/// Single-writer state store. Readers poll the latest snapshot through `watch`
/// or follow every update through `broadcast`.
///
/// Each reset starts a new epoch. Writes go through a [`FlowRun`] bound to the
/// epoch it was opened in, so a run that outlives a reset cannot touch the fresh state.
#[derive(Debug)]
pub struct FlowState {
    snapshot_tx: watch::Sender<FlowSnapshot>,
    events_tx: broadcast::Sender<FlowEvent>,
    epoch: AtomicU64,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowState {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(FlowSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot_tx,
            events_tx,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<FlowSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.events_tx.subscribe()
    }

    /// Opens a write handle for the current epoch.
    pub(crate) fn run(&self) -> FlowRun<'_> {
        FlowRun {
            state: self,
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn reset(&self) {
        // bumped under the watch lock so no stale write can interleave
        self.snapshot_tx.send_modify(|s| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *s = FlowSnapshot::default();
        });
        let _ = self.events_tx.send(FlowEvent::Reset);
    }

    fn update(&self, epoch: u64, event: FlowEvent, apply: impl FnOnce(&mut FlowSnapshot)) -> bool {
        let applied = self.snapshot_tx.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            apply(s);
            true
        });
        if applied {
            // no subscribers is fine
            let _ = self.events_tx.send(event);
        } else {
            warn!(epoch, event = ?event, "dropping state update from a run superseded by reset");
        }
        applied
    }
}

/// Write handle for one contribution run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowRun<'a> {
    state: &'a FlowState,
    epoch: u64,
}

impl FlowRun<'_> {
    pub(crate) fn begin(&self) -> bool {
        self.state
            .update(self.epoch, FlowEvent::PhaseChanged(FlowPhase::Signing), |s| {
                s.error = None;
                s.is_success = false;
                s.phase = FlowPhase::Signing;
            })
    }

    pub(crate) fn start_step(&self, step: Step) -> bool {
        let phase = FlowPhase::for_step(step);
        self.state
            .update(self.epoch, FlowEvent::StepStarted(step), |s| {
                s.phase = phase;
                s.current_step = s.current_step.max(step.number());
            })
    }

    pub(crate) fn complete_step(&self, step: Step) -> bool {
        let number = step.number();
        self.state
            .update(self.epoch, FlowEvent::StepCompleted(step), |s| {
                if s.completed_steps.last().map_or(true, |last| *last < number) {
                    s.completed_steps.push(number);
                }
            })
    }

    pub(crate) fn merge_data(&self, patch: ContributionPatch) -> bool {
        self.state
            .update(self.epoch, FlowEvent::DataMerged(patch.clone()), |s| {
                s.contribution_data
                    .get_or_insert_with(ContributionData::default)
                    .merge(patch);
            })
    }

    pub(crate) fn set_share_url(&self, url: &str) -> bool {
        self.state
            .update(self.epoch, FlowEvent::ShareUrlSet(url.to_string()), |s| {
                s.share_url = url.to_string();
            })
    }

    pub(crate) fn fail(&self, message: String) -> bool {
        self.state
            .update(self.epoch, FlowEvent::Failed(message.clone()), |s| {
                s.phase = FlowPhase::Failed;
                s.error = Some(message);
            })
    }

    pub(crate) fn succeed(&self) -> bool {
        self.state.update(self.epoch, FlowEvent::Succeeded, |s| {
            s.phase = FlowPhase::Succeeded;
            s.is_success = true;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_steps_never_repeat_or_go_backwards() {
        let state = FlowState::new();
        let run = state.run();
        run.complete_step(Step::Upload);
        run.complete_step(Step::Upload);
        run.complete_step(Step::BlockchainRegistration);
        assert_eq!(state.snapshot().completed_steps, vec![1, 2]);
    }

    #[test]
    fn reset_restores_default_snapshot() {
        let state = FlowState::new();
        let run = state.run();
        run.begin();
        run.start_step(Step::Upload);
        run.merge_data(ContributionPatch {
            file_id: Some(9),
            ..Default::default()
        });
        run.fail("boom".to_string());
        state.reset();
        assert_eq!(state.snapshot(), FlowSnapshot::default());
    }

    #[test]
    fn busy_only_while_active() {
        let state = FlowState::new();
        let run = state.run();
        assert!(!state.snapshot().is_busy());
        run.begin();
        assert!(state.snapshot().is_busy());
        run.succeed();
        assert!(!state.snapshot().is_busy());
    }

    #[test]
    fn writes_from_a_superseded_run_are_dropped() {
        let state = FlowState::new();
        let mut events = state.subscribe_events();
        let stale = state.run();
        stale.begin();
        stale.start_step(Step::Upload);

        state.reset();
        assert!(!stale.start_step(Step::RequestTeeProof));
        assert!(!stale.merge_data(ContributionPatch {
            tee_job_id: Some("job-1".to_string()),
            ..Default::default()
        }));
        assert!(!stale.complete_step(Step::RequestTeeProof));
        assert!(!stale.succeed());
        assert_eq!(state.snapshot(), FlowSnapshot::default());

        let fresh = state.run();
        assert!(fresh.begin());
        assert_eq!(state.snapshot().phase, FlowPhase::Signing);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                FlowEvent::PhaseChanged(FlowPhase::Signing),
                FlowEvent::StepStarted(Step::Upload),
                FlowEvent::Reset,
                FlowEvent::PhaseChanged(FlowPhase::Signing),
            ]
        );
    }
}
