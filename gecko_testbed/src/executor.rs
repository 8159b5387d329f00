//! Per-axis step execution.
//!
//! Each step walks the phases AwaitInit → Moving → Holding → Done. A phase
//! whose inputs are absent is skipped: no init triggers skips AwaitInit, no
//! breaking triggers skips Moving (the axis does not move at all), no hold
//! threshold skips Holding.
//!
//! Every loop iteration checks the run token first, so a stop is honoured
//! within one pulse or one hold correction.

use crate::context::MotionContext;
use crate::events::{MotionEvent, TriggerPhase};
use crate::hold::{HoldOutcome, hold_force};
use crate::state::RunToken;
use crate::trigger::TriggerGroup;
use gecko_common::prelude::*;
use std::thread;
use std::time::Instant;
use tracing::debug;

/// Phase of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Waiting for movement initiation triggers.
    AwaitInit,
    /// Pulsing until breaking triggers fire.
    Moving,
    /// Holding force until hold triggers fire.
    Holding,
    /// Step finished.
    Done,
}

impl StepPhase {
    /// First phase `step` actually runs.
    pub fn entry(step: &Step) -> Self {
        StepPhase::AwaitInit.resolve(step)
    }

    /// Phase following `self` once its condition is met.
    pub fn next(self, step: &Step) -> Self {
        let following = match self {
            StepPhase::AwaitInit => StepPhase::Moving,
            StepPhase::Moving => StepPhase::Holding,
            StepPhase::Holding | StepPhase::Done => StepPhase::Done,
        };
        following.resolve(step)
    }

    fn applies(self, step: &Step) -> bool {
        match self {
            StepPhase::AwaitInit => !step.move_init_triggers.is_empty(),
            StepPhase::Moving => !step.triggers.is_empty(),
            StepPhase::Holding => step.hold_threshold.is_some(),
            StepPhase::Done => true,
        }
    }

    fn resolve(self, step: &Step) -> Self {
        let mut phase = self;
        while !phase.applies(step) {
            phase = match phase {
                StepPhase::AwaitInit => StepPhase::Moving,
                StepPhase::Moving => StepPhase::Holding,
                StepPhase::Holding | StepPhase::Done => StepPhase::Done,
            };
        }
        phase
    }
}

/// How an axis program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOutcome {
    /// Every step reached Done.
    Completed,
    /// The run flag was lost.
    Cancelled,
}

/// One step in progress.
pub struct StepExecution<'a> {
    step: &'a Step,
    phase: StepPhase,
    phase_started: Instant,
    steps_taken: u64,
    hold_announced: bool,
    init: TriggerGroup<'a>,
    breaks: TriggerGroup<'a>,
    hold: TriggerGroup<'a>,
}

impl<'a> StepExecution<'a> {
    /// Fresh execution with new trigger latches.
    pub fn new(step: &'a Step) -> Self {
        Self {
            step,
            phase: StepPhase::entry(step),
            phase_started: Instant::now(),
            steps_taken: 0,
            hold_announced: false,
            init: TriggerGroup::new(&step.move_init_triggers, step.fire_all_init_triggers),
            breaks: TriggerGroup::new(&step.triggers, step.fire_all_triggers),
            hold: TriggerGroup::new(&step.hold_triggers, step.fire_all_hold_triggers),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Pulses issued in the moving phase.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    fn enter(&mut self, phase: StepPhase) {
        self.phase = phase;
        self.phase_started = Instant::now();
    }

    fn announce(&self, ctx: &MotionContext, phase: TriggerPhase, group: &TriggerGroup<'_>, fired: &[usize]) {
        for &i in fired {
            if let Some(trigger) = group.trigger(i) {
                ctx.events.publish(MotionEvent::TriggerFired {
                    axis: self.step.axis,
                    phase,
                    trigger: trigger.clone(),
                });
            }
        }
    }

    /// Run one iteration of the current phase and return the phase after it.
    pub fn advance(&mut self, ctx: &MotionContext, token: &RunToken) -> Result<StepPhase, TestbedError> {
        let axis = self.step.axis;
        let limit = ctx.max_force_limit;
        let inputs = ctx.inputs(self.phase_started.elapsed(), self.steps_taken);

        match self.phase {
            StepPhase::AwaitInit => {
                let outcome = self.init.evaluate(&inputs, limit);
                self.announce(ctx, TriggerPhase::MovementStart, &self.init, &outcome.newly_fired);
                if outcome.satisfied {
                    self.enter(self.phase.next(self.step));
                } else {
                    thread::sleep(ctx.motion.trigger_poll());
                }
            }
            StepPhase::Moving => {
                let outcome = self.breaks.evaluate(&inputs, limit);
                self.announce(ctx, TriggerPhase::MovementBreak, &self.breaks, &outcome.newly_fired);
                if outcome.satisfied {
                    debug!("Axis {} broke after {} pulses", axis, self.steps_taken);
                    ctx.events.publish(MotionEvent::MovementBroken { axis });
                    self.enter(self.phase.next(self.step));
                } else if ctx
                    .actuator
                    .pulse(axis, self.step.direction, self.step.pulse_width, token)?
                    .is_some()
                {
                    self.steps_taken += 1;
                }
            }
            StepPhase::Holding => {
                let target = self.step.hold_threshold.unwrap_or_default();
                if !self.hold_announced {
                    self.hold_announced = true;
                    ctx.events.publish(MotionEvent::HoldStarted { axis, target });
                }
                let outcome = self.hold.evaluate(&inputs, limit);
                self.announce(ctx, TriggerPhase::HoldBreak, &self.hold, &outcome.newly_fired);
                if outcome.satisfied {
                    ctx.events.publish(MotionEvent::HoldCompleted { axis, target });
                    self.enter(self.phase.next(self.step));
                } else if hold_force(ctx, axis, target, token)? == HoldOutcome::OnTarget {
                    thread::sleep(ctx.motion.trigger_poll());
                }
            }
            StepPhase::Done => {}
        }
        Ok(self.phase)
    }
}

/// Execute an axis program step by step.
///
/// Returns `Cancelled` as soon as the run flag is lost. Transport errors
/// are returned to the caller, which halts the run.
pub fn run_program(
    ctx: &MotionContext,
    axis: Axis,
    program: &AxisProgram,
    token: &RunToken,
) -> Result<AxisOutcome, TestbedError> {
    for (index, step) in program.steps.iter().enumerate() {
        if !token.is_live() {
            return Ok(AxisOutcome::Cancelled);
        }
        ctx.events.publish(MotionEvent::StepStarted { axis, index });
        let mut execution = StepExecution::new(step);
        while execution.phase() != StepPhase::Done {
            if !token.is_live() {
                return Ok(AxisOutcome::Cancelled);
            }
            execution.advance(ctx, token)?;
        }
        ctx.events.publish(MotionEvent::StepCompleted { axis, index });
    }
    Ok(AxisOutcome::Completed)
}
