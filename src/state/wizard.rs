use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Phases a form session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    /// No player chosen yet.
    Unset,
    /// Filling the given step (1-based).
    Step(usize),
    /// The last step was submitted; the session is reset right after.
    Complete,
}

/// Events that can be applied to the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    /// A registered player was chosen.
    Start,
    /// Save the current step and move forward.
    Next,
    /// Save the current step and move back.
    Previous,
    /// Save the last step and complete the form.
    Finish,
    /// Drop the progress and go back to player selection.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?} (of {total_steps} steps)")]
pub struct InvalidTransition {
    /// The phase the wizard was in when the invalid event was received.
    pub from: WizardPhase,
    /// The event that cannot be applied from this phase.
    pub event: WizardEvent,
    /// Number of steps configured for the session.
    pub total_steps: usize,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: WizardPhase,
        /// Current phase.
        actual: WizardPhase,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A planned transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the wizard is currently in.
    pub from: WizardPhase,
    /// Phase the wizard will transition to.
    pub to: WizardPhase,
    /// Event that triggered this transition.
    pub event: WizardEvent,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the wizard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: WizardPhase,
    /// Number of applied transitions.
    pub version: usize,
    /// Pending transition target, if any.
    pub pending: Option<WizardPhase>,
}

/// Plan/apply/abort state machine over a fixed number of steps.
#[derive(Debug, Clone)]
pub struct WizardStateMachine {
    phase: WizardPhase,
    total_steps: usize,
    version: usize,
    pending: Option<Plan>,
}

impl WizardStateMachine {
    /// Create a machine in [`WizardPhase::Unset`] for `total_steps` steps.
    pub fn new(total_steps: usize) -> Self {
        Self {
            phase: WizardPhase::Unset,
            total_steps,
            version: 0,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    /// Number of steps the machine walks through.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Current 1-based step, if a step is being filled.
    pub fn current_step(&self) -> Option<usize> {
        match self.phase {
            WizardPhase::Step(step) => Some(step),
            _ => None,
        }
    }

    /// Create a snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate that `event` can be applied from the current phase and reserve it.
    pub fn plan(&mut self, event: WizardEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            pending_since: Instant::now(),
        };
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<WizardPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        self.phase = plan.to;
        self.version += 1;

        Ok(self.phase)
    }

    /// Drop a planned transition, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: WizardEvent) -> Result<WizardPhase, InvalidTransition> {
        let total = self.total_steps;
        let next = match (self.phase, event) {
            (WizardPhase::Unset | WizardPhase::Complete, WizardEvent::Start) if total > 0 => {
                WizardPhase::Step(1)
            }
            (WizardPhase::Step(k), WizardEvent::Next) if k < total => WizardPhase::Step(k + 1),
            (WizardPhase::Step(k), WizardEvent::Previous) if k > 1 => WizardPhase::Step(k - 1),
            (WizardPhase::Step(k), WizardEvent::Finish) if k == total => WizardPhase::Complete,
            (WizardPhase::Step(_) | WizardPhase::Complete, WizardEvent::Reset) => {
                WizardPhase::Unset
            }
            (from, event) => {
                return Err(InvalidTransition {
                    from,
                    event,
                    total_steps: total,
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut WizardStateMachine, event: WizardEvent) -> WizardPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_unset() {
        let sm = WizardStateMachine::new(5);
        assert_eq!(sm.phase(), WizardPhase::Unset);
        assert_eq!(sm.current_step(), None);
    }

    #[test]
    fn walks_forward_and_back_through_every_step() {
        let mut sm = WizardStateMachine::new(3);

        assert_eq!(apply(&mut sm, WizardEvent::Start), WizardPhase::Step(1));
        assert_eq!(apply(&mut sm, WizardEvent::Next), WizardPhase::Step(2));
        assert_eq!(apply(&mut sm, WizardEvent::Previous), WizardPhase::Step(1));
        assert_eq!(apply(&mut sm, WizardEvent::Next), WizardPhase::Step(2));
        assert_eq!(apply(&mut sm, WizardEvent::Next), WizardPhase::Step(3));
        assert_eq!(apply(&mut sm, WizardEvent::Finish), WizardPhase::Complete);
        assert_eq!(sm.snapshot().version, 6);
    }

    #[test]
    fn bounds_are_enforced() {
        let mut sm = WizardStateMachine::new(2);
        apply(&mut sm, WizardEvent::Start);

        assert!(matches!(
            sm.plan(WizardEvent::Previous),
            Err(PlanError::InvalidTransition(_))
        ));
        assert!(matches!(
            sm.plan(WizardEvent::Finish),
            Err(PlanError::InvalidTransition(_))
        ));

        apply(&mut sm, WizardEvent::Next);
        assert!(matches!(
            sm.plan(WizardEvent::Next),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn nothing_but_start_is_accepted_while_unset() {
        let mut sm = WizardStateMachine::new(5);
        for event in [
            WizardEvent::Next,
            WizardEvent::Previous,
            WizardEvent::Finish,
            WizardEvent::Reset,
        ] {
            assert!(sm.plan(event).is_err(), "{event:?} accepted while unset");
        }
    }

    #[test]
    fn empty_flow_cannot_start() {
        let mut sm = WizardStateMachine::new(0);
        assert!(sm.plan(WizardEvent::Start).is_err());
    }

    #[test]
    fn pending_plan_blocks_others_until_aborted() {
        let mut sm = WizardStateMachine::new(5);
        let plan = sm.plan(WizardEvent::Start).unwrap();

        assert_eq!(sm.plan(WizardEvent::Start).unwrap_err(), PlanError::AlreadyPending);
        assert_eq!(sm.snapshot().pending, Some(WizardPhase::Step(1)));

        sm.abort(plan.id).unwrap();
        assert_eq!(sm.phase(), WizardPhase::Unset);
        assert_eq!(sm.snapshot().pending, None);
    }

    #[test]
    fn apply_rejects_foreign_plan_id() {
        let mut sm = WizardStateMachine::new(5);
        let plan = sm.plan(WizardEvent::Start).unwrap();

        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), WizardPhase::Step(1));
    }

    #[test]
    fn reset_returns_to_unset_from_any_step() {
        let mut sm = WizardStateMachine::new(5);
        apply(&mut sm, WizardEvent::Start);
        apply(&mut sm, WizardEvent::Next);
        assert_eq!(apply(&mut sm, WizardEvent::Reset), WizardPhase::Unset);
    }
}
