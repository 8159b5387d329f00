//! Trigger evaluation.
//!
//! [`evaluate`] is a pure function of one trigger and a snapshot of the
//! measurements. [`TriggerGroup`] adds the per-activation bookkeeping: which
//! triggers have already fired (so each is announced once) and whether the
//! group as a whole is satisfied.

use gecko_common::prelude::*;
use std::time::Duration;

/// Measurements a trigger may look at.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInputs {
    /// Latest force reading.
    pub force: ForceReading,
    /// Time since the current phase began.
    pub elapsed: Duration,
    /// Pulses issued by the current step.
    pub steps: u64,
}

/// Whether `trigger` fires for `inputs`.
///
/// Any force trigger fires once the magnitude of its component exceeds
/// `max_force`, whatever its own comparison says. Distance triggers never
/// fire.
pub fn evaluate(trigger: &Trigger, inputs: &TriggerInputs, max_force: f64) -> bool {
    match &trigger.kind {
        TriggerKind::Force(axis) => {
            let current = inputs.force.component(*axis);
            current.abs() > max_force || trigger.comparator.compare(current, trigger.value)
        }
        TriggerKind::Duration => trigger
            .comparator
            .compare(inputs.elapsed.as_secs_f64(), trigger.value),
        TriggerKind::Steps => trigger.comparator.compare(inputs.steps as f64, trigger.value),
        TriggerKind::Distance(_) => false,
    }
}

/// Firing state of one trigger within an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    /// Not yet seen true.
    Unfired,
    /// Seen true at least once.
    Fired,
}

/// Result of one group evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    /// Group condition met (all or any, per the group mode).
    pub satisfied: bool,
    /// Indices of triggers that fired for the first time.
    pub newly_fired: Vec<usize>,
}

/// A trigger list with its aggregation mode and latches.
///
/// The aggregate counts triggers true on the current evaluation; latches
/// only suppress repeated announcements.
pub struct TriggerGroup<'a> {
    triggers: &'a [Trigger],
    fire_all: bool,
    latches: Vec<Latch>,
}

impl<'a> TriggerGroup<'a> {
    /// Fresh activation of `triggers`.
    pub fn new(triggers: &'a [Trigger], fire_all: bool) -> Self {
        Self {
            triggers,
            fire_all,
            latches: vec![Latch::Unfired; triggers.len()],
        }
    }

    /// Whether the group has no triggers.
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Trigger at `index`.
    pub fn trigger(&self, index: usize) -> Option<&'a Trigger> {
        self.triggers.get(index)
    }

    /// Latch of the trigger at `index`.
    pub fn latch(&self, index: usize) -> Option<Latch> {
        self.latches.get(index).copied()
    }

    /// Evaluate every trigger once.
    ///
    /// An empty group is satisfied in all-mode and never in any-mode.
    pub fn evaluate(&mut self, inputs: &TriggerInputs, max_force: f64) -> GroupOutcome {
        let mut count = 0;
        let mut newly_fired = Vec::new();
        for (i, trigger) in self.triggers.iter().enumerate() {
            if evaluate(trigger, inputs, max_force) {
                count += 1;
                if self.latches[i] == Latch::Unfired {
                    self.latches[i] = Latch::Fired;
                    newly_fired.push(i);
                }
            }
        }
        let satisfied = if self.fire_all {
            count == self.triggers.len()
        } else {
            count > 0
        };
        GroupOutcome {
            satisfied,
            newly_fired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: f64 = 10.0;

    fn inputs(fz: f64) -> TriggerInputs {
        TriggerInputs {
            force: ForceReading::new(0.0, 0.0, fz),
            elapsed: Duration::ZERO,
            steps: 0,
        }
    }

    #[test]
    fn test_force_comparison() {
        let t = Trigger::force(ForceAxis::Fz, Comparator::Ge, 1.0);
        assert!(!evaluate(&t, &inputs(0.99), LIMIT));
        assert!(evaluate(&t, &inputs(1.0), LIMIT));
    }

    #[test]
    fn test_safety_override() {
        // Comparison alone would never fire.
        let t = Trigger::force(ForceAxis::Fz, Comparator::Ge, 100.0);
        assert!(!evaluate(&t, &inputs(LIMIT), LIMIT));
        assert!(evaluate(&t, &inputs(LIMIT + 1.0), LIMIT));
        assert!(evaluate(&t, &inputs(-LIMIT - 1.0), LIMIT));

        let t = Trigger::force(ForceAxis::Fz, Comparator::Lt, -5.0);
        assert!(evaluate(&t, &inputs(11.0), LIMIT));
    }

    #[test]
    fn test_shear_trigger() {
        let t = Trigger::force(ForceAxis::Shear, Comparator::Ge, 5.0);
        let mut i = inputs(0.0);
        i.force = ForceReading::new(3.0, 4.0, 0.0);
        assert!(evaluate(&t, &i, LIMIT));
    }

    #[test]
    fn test_duration_and_steps() {
        let dur = Trigger::new(TriggerKind::Duration, Comparator::Gt, 0.5);
        let steps = Trigger::new(TriggerKind::Steps, Comparator::Ge, 5.0);
        let mut i = inputs(0.0);
        i.elapsed = Duration::from_millis(600);
        i.steps = 4;
        assert!(evaluate(&dur, &i, LIMIT));
        assert!(!evaluate(&steps, &i, LIMIT));
        i.steps = 5;
        assert!(evaluate(&steps, &i, LIMIT));
    }

    #[test]
    fn test_distance_never_fires() {
        let t = Trigger::new(TriggerKind::Distance("Z".into()), Comparator::Ge, 0.0);
        assert!(!evaluate(&t, &inputs(50.0), LIMIT));
    }

    #[test]
    fn test_group_any_and_latches() {
        let triggers = [
            Trigger::force(ForceAxis::Fz, Comparator::Ge, 1.0),
            Trigger::new(TriggerKind::Steps, Comparator::Ge, 3.0),
        ];
        let mut group = TriggerGroup::new(&triggers, false);

        let outcome = group.evaluate(&inputs(1.5), LIMIT);
        assert!(outcome.satisfied);
        assert_eq!(outcome.newly_fired, vec![0]);

        // Fired again: satisfied, but not announced twice.
        let outcome = group.evaluate(&inputs(1.5), LIMIT);
        assert!(outcome.satisfied);
        assert!(outcome.newly_fired.is_empty());
        assert_eq!(group.latch(0), Some(Latch::Fired));
        assert_eq!(group.latch(1), Some(Latch::Unfired));
    }

    #[test]
    fn test_group_all_counts_current_truth() {
        let triggers = [
            Trigger::force(ForceAxis::Fz, Comparator::Ge, 1.0),
            Trigger::new(TriggerKind::Steps, Comparator::Ge, 3.0),
        ];
        let mut group = TriggerGroup::new(&triggers, true);

        assert!(!group.evaluate(&inputs(1.5), LIMIT).satisfied);

        // Fz dropped back below while steps reached: still not all true now.
        let mut i = inputs(0.5);
        i.steps = 3;
        assert!(!group.evaluate(&i, LIMIT).satisfied);

        i.force = ForceReading::new(0.0, 0.0, 2.0);
        assert!(group.evaluate(&i, LIMIT).satisfied);
    }

    #[test]
    fn test_three_trigger_aggregation() {
        let triggers = [
            Trigger::force(ForceAxis::Fz, Comparator::Ge, 1.0),
            Trigger::new(TriggerKind::Steps, Comparator::Ge, 3.0),
            Trigger::new(TriggerKind::Duration, Comparator::Ge, 0.5),
        ];
        let at = |fz: f64, steps: u64, ms: u64| TriggerInputs {
            force: ForceReading::new(0.0, 0.0, fz),
            elapsed: Duration::from_millis(ms),
            steps,
        };
        // (inputs, how many of the three hold)
        let cases = [
            (at(0.0, 0, 0), 0),
            (at(2.0, 0, 0), 1),
            (at(0.0, 3, 600), 2),
            (at(2.0, 3, 0), 2),
            (at(2.0, 3, 600), 3),
        ];

        for (i, true_count) in cases {
            let mut all = TriggerGroup::new(&triggers, true);
            let mut any = TriggerGroup::new(&triggers, false);
            assert_eq!(all.evaluate(&i, LIMIT).satisfied, true_count == 3);
            assert_eq!(any.evaluate(&i, LIMIT).satisfied, true_count >= 1);
        }
    }

    #[test]
    fn test_empty_group() {
        let mut any = TriggerGroup::new(&[], false);
        let mut all = TriggerGroup::new(&[], true);
        assert!(any.is_empty());
        assert!(!any.evaluate(&inputs(0.0), LIMIT).satisfied);
        assert!(all.evaluate(&inputs(0.0), LIMIT).satisfied);
    }
}
