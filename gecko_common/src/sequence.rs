//! Triggers, steps, axis programs and sequences.
//!
//! Domain types are immutable once parsed. Sequence documents arrive as JSON
//! in the operator UI format and are converted through wire structs so that
//! configuration errors keep their kind (`UnknownTriggerType`,
//! `UnknownComparator`, `InvalidAxis`) instead of collapsing into a generic
//! parse error.
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "Z": [{
//!     "type": "move-z-axis",
//!     "data": {
//!       "direction": "negative",
//!       "stepSize": 1,
//!       "moveInitTriggers": [],
//!       "fireAllInitTriggers": "False",
//!       "triggers": [{"triggerType": "Fz (N)", "comparator": ">=", "value": 2.0}],
//!       "fireAllTriggers": "False",
//!       "holdThreshold": "NaN",
//!       "holdTriggers": [],
//!       "fireAllHoldTriggers": "False"
//!     }
//!   }],
//!   "repeat": 1
//! }
//! ```

use crate::axis::{Axis, Direction, ForceAxis};
use crate::error::TestbedError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ─── Comparator ─────────────────────────────────────────────────────

/// Numeric relation used by a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

impl Comparator {
    /// Operator symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
        }
    }

    /// Apply the relation `current <op> target`.
    #[inline]
    pub fn compare(self, current: f64, target: f64) -> bool {
        match self {
            Comparator::Ge => current >= target,
            Comparator::Le => current <= target,
            Comparator::Eq => current == target,
            Comparator::Gt => current > target,
            Comparator::Lt => current < target,
        }
    }
}

impl FromStr for Comparator {
    type Err = TestbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">=" | "≥" => Ok(Comparator::Ge),
            "<=" | "≤" => Ok(Comparator::Le),
            "==" | "=" => Ok(Comparator::Eq),
            ">" => Ok(Comparator::Gt),
            "<" => Ok(Comparator::Lt),
            other => Err(TestbedError::UnknownComparator(other.to_string())),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ─── Trigger ────────────────────────────────────────────────────────

/// What a trigger measures.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// `"<Axis> (N)"`: a force component.
    Force(ForceAxis),
    /// `"duration"`: seconds since the current phase began.
    Duration,
    /// `"steps"`: pulses issued by the current step.
    Steps,
    /// `"<Axis> (mm)"`: distance, never fires.
    Distance(String),
}

impl TriggerKind {
    /// Wire label (`"Fz (N)"`, `"duration"`, ...).
    pub fn label(&self) -> String {
        match self {
            TriggerKind::Force(axis) => format!("{axis} (N)"),
            TriggerKind::Duration => "duration".to_string(),
            TriggerKind::Steps => "steps".to_string(),
            TriggerKind::Distance(axis) => format!("{axis} (mm)"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = TestbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((prefix, _)) = s.split_once("(N)") {
            return prefix
                .trim()
                .parse::<ForceAxis>()
                .map(TriggerKind::Force)
                .map_err(|_| TestbedError::UnknownTriggerType(s.to_string()));
        }
        if s.contains("duration") {
            return Ok(TriggerKind::Duration);
        }
        if s.contains("steps") {
            return Ok(TriggerKind::Steps);
        }
        if let Some((prefix, _)) = s.split_once("(mm)") {
            return Ok(TriggerKind::Distance(prefix.trim().to_string()));
        }
        Err(TestbedError::UnknownTriggerType(s.to_string()))
    }
}

/// Condition that starts, breaks or ends motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Measured quantity.
    pub kind: TriggerKind,
    /// Relation applied to the measurement.
    pub comparator: Comparator,
    /// Threshold.
    pub value: f64,
}

impl Trigger {
    /// Build a trigger.
    pub fn new(kind: TriggerKind, comparator: Comparator, value: f64) -> Self {
        Self {
            kind,
            comparator,
            value,
        }
    }

    /// Force trigger shorthand.
    pub fn force(axis: ForceAxis, comparator: Comparator, value: f64) -> Self {
        Self::new(TriggerKind::Force(axis), comparator, value)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.label(), self.comparator, self.value)
    }
}

/// Parses the display form, e.g. `"Fz (N) >= 2.5"`.
impl FromStr for Trigger {
    type Err = TestbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let is_op = |c: char| matches!(c, '>' | '<' | '=');
        let start = s
            .find(is_op)
            .ok_or_else(|| TestbedError::UnknownComparator(s.to_string()))?;
        let rest = &s[start..];
        let end = rest.find(|c: char| !is_op(c)).unwrap_or(rest.len());
        let value = rest[end..].trim();
        Ok(Self {
            kind: s[..start].trim().parse()?,
            comparator: rest[..end].parse()?,
            value: value
                .parse()
                .map_err(|_| TestbedError::InvalidSequence(format!("bad trigger value {value:?}")))?,
        })
    }
}

// ─── Step / program / sequence ──────────────────────────────────────

/// One phase of an axis program.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Axis this step drives.
    pub axis: Axis,
    /// Movement direction while in the moving phase.
    pub direction: Direction,
    /// Step output high time per pulse.
    pub pulse_width: Duration,
    /// Triggers that must fire before movement starts.
    pub move_init_triggers: Vec<Trigger>,
    /// Require every init trigger (otherwise any one).
    pub fire_all_init_triggers: bool,
    /// Triggers that break movement.
    pub triggers: Vec<Trigger>,
    /// Require every breaking trigger (otherwise any one).
    pub fire_all_triggers: bool,
    /// Force to hold after movement; `None` skips the hold phase.
    pub hold_threshold: Option<f64>,
    /// Triggers that end the hold.
    pub hold_triggers: Vec<Trigger>,
    /// Require every hold trigger (otherwise any one).
    pub fire_all_hold_triggers: bool,
}

impl Step {
    /// Step with no triggers and no hold.
    pub fn new(axis: Axis, direction: Direction, pulse_width: Duration) -> Self {
        Self {
            axis,
            direction,
            pulse_width,
            move_init_triggers: Vec::new(),
            fire_all_init_triggers: false,
            triggers: Vec::new(),
            fire_all_triggers: false,
            hold_threshold: None,
            hold_triggers: Vec::new(),
            fire_all_hold_triggers: false,
        }
    }
}

/// Ordered steps for one axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisProgram {
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl AxisProgram {
    /// Wrap a list of steps.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Whether the program has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Full experiment definition: one program per axis plus a repeat count.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Programs keyed by axis.
    pub programs: BTreeMap<Axis, AxisProgram>,
    /// Number of iterations, at least 1.
    pub repeat: u32,
}

impl Sequence {
    /// Empty sequence running once.
    pub fn new() -> Self {
        Self {
            programs: BTreeMap::new(),
            repeat: 1,
        }
    }

    /// Builder: set the program for an axis.
    pub fn with_program(mut self, axis: Axis, program: AxisProgram) -> Self {
        self.programs.insert(axis, program);
        self
    }

    /// Builder: set the repeat count.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    /// Axes with at least one step.
    pub fn active_axes(&self) -> impl Iterator<Item = (Axis, &AxisProgram)> {
        self.programs
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(a, p)| (*a, p))
    }

    /// Parse a sequence document.
    ///
    /// # Errors
    ///
    /// - `InvalidSequence` if the document has the wrong shape
    /// - `InvalidAxis` for an unknown program key
    /// - `UnknownTriggerType` / `UnknownComparator` for bad triggers
    pub fn from_json(text: &str) -> Result<Self, TestbedError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| TestbedError::InvalidSequence(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse an already-decoded sequence document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, TestbedError> {
        let serde_json::Value::Object(map) = value else {
            return Err(TestbedError::InvalidSequence(
                "sequence must be a JSON object".to_string(),
            ));
        };

        let mut sequence = Sequence::new();
        for (key, entry) in map {
            if key == "repeat" {
                sequence.repeat = parse_repeat(&entry)?;
                continue;
            }
            let axis: Axis = key.parse()?;
            let entries: Vec<WireStepEntry> = serde_json::from_value(entry)
                .map_err(|e| TestbedError::InvalidSequence(format!("axis {axis}: {e}")))?;
            let steps = entries
                .into_iter()
                .map(|e| e.into_step(axis))
                .collect::<Result<Vec<_>, _>>()?;
            sequence.programs.insert(axis, AxisProgram::new(steps));
        }
        Ok(sequence)
    }

    /// Render in the wire format (used for run-log headers).
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (axis, program) in &self.programs {
            let steps: Vec<WireStep> = program.steps.iter().map(WireStep::from).collect();
            map.insert(
                axis.label().to_string(),
                serde_json::to_value(steps).unwrap_or(serde_json::Value::Null),
            );
        }
        map.insert("repeat".to_string(), self.repeat.into());
        serde_json::Value::Object(map)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Missing, null, empty or zero repeat means one iteration.
fn parse_repeat(value: &serde_json::Value) -> Result<u32, TestbedError> {
    let invalid = || TestbedError::InvalidSequence(format!("invalid repeat value {value}"));
    let count = match value {
        serde_json::Value::Null => 0,
        serde_json::Value::Number(n) => n.as_u64().ok_or_else(invalid)?,
        serde_json::Value::String(s) if s.trim().is_empty() => 0,
        serde_json::Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    u32::try_from(count.max(1)).map_err(|_| invalid())
}

// ─── Wire format ────────────────────────────────────────────────────

/// Number sent either as JSON number or numeric string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Num(f64),
    Text(String),
}

impl WireNumber {
    /// `None` for `"NaN"`/empty strings and NaN numbers.
    fn value(&self) -> Result<Option<f64>, TestbedError> {
        let v = match self {
            WireNumber::Num(v) => *v,
            WireNumber::Text(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                    return Ok(None);
                }
                s.parse::<f64>().map_err(|_| {
                    TestbedError::InvalidSequence(format!("expected a number, got {s:?}"))
                })?
            }
        };
        Ok((!v.is_nan()).then_some(v))
    }

    fn required(&self, field: &str) -> Result<f64, TestbedError> {
        self.value()?
            .ok_or_else(|| TestbedError::InvalidSequence(format!("{field} must be a number")))
    }
}

/// Boolean sent either as JSON bool or `"True"`/`"False"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Text(String),
}

impl Default for WireFlag {
    fn default() -> Self {
        WireFlag::Bool(false)
    }
}

impl WireFlag {
    fn value(&self) -> bool {
        match self {
            WireFlag::Bool(b) => *b,
            WireFlag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTrigger {
    trigger_type: String,
    #[serde(default = "default_comparator")]
    comparator: String,
    value: WireNumber,
}

fn default_comparator() -> String {
    ">=".to_string()
}

impl WireTrigger {
    fn into_trigger(self) -> Result<Trigger, TestbedError> {
        Ok(Trigger {
            kind: self.trigger_type.parse()?,
            comparator: self.comparator.parse()?,
            value: self.value.required("trigger value")?,
        })
    }
}

impl From<&Trigger> for WireTrigger {
    fn from(t: &Trigger) -> Self {
        Self {
            trigger_type: t.kind.label(),
            comparator: t.comparator.symbol().to_string(),
            value: WireNumber::Num(t.value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStep {
    direction: Direction,
    step_size: WireNumber,
    #[serde(default)]
    move_init_triggers: Vec<WireTrigger>,
    #[serde(default)]
    fire_all_init_triggers: WireFlag,
    #[serde(default)]
    triggers: Vec<WireTrigger>,
    #[serde(default)]
    fire_all_triggers: WireFlag,
    #[serde(default)]
    hold_threshold: Option<WireNumber>,
    #[serde(default)]
    hold_triggers: Vec<WireTrigger>,
    #[serde(default)]
    fire_all_hold_triggers: WireFlag,
}

impl WireStep {
    fn into_step(self, axis: Axis) -> Result<Step, TestbedError> {
        let ms = self.step_size.required("stepSize")?;
        if !(ms.is_finite() && ms > 0.0) {
            return Err(TestbedError::InvalidSequence(format!(
                "stepSize must be positive, got {ms}"
            )));
        }
        let hold_threshold = match self.hold_threshold {
            Some(n) => n.value()?,
            None => None,
        };
        let convert = |list: Vec<WireTrigger>| {
            list.into_iter()
                .map(WireTrigger::into_trigger)
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Step {
            axis,
            direction: self.direction,
            pulse_width: Duration::from_nanos((ms * 1e6).round() as u64),
            move_init_triggers: convert(self.move_init_triggers)?,
            fire_all_init_triggers: self.fire_all_init_triggers.value(),
            triggers: convert(self.triggers)?,
            fire_all_triggers: self.fire_all_triggers.value(),
            hold_threshold,
            hold_triggers: convert(self.hold_triggers)?,
            fire_all_hold_triggers: self.fire_all_hold_triggers.value(),
        })
    }
}

impl From<&Step> for WireStep {
    fn from(s: &Step) -> Self {
        let list = |ts: &[Trigger]| ts.iter().map(WireTrigger::from).collect();
        Self {
            direction: s.direction,
            step_size: WireNumber::Num(s.pulse_width.as_nanos() as f64 / 1e6),
            move_init_triggers: list(&s.move_init_triggers),
            fire_all_init_triggers: WireFlag::Bool(s.fire_all_init_triggers),
            triggers: list(&s.triggers),
            fire_all_triggers: WireFlag::Bool(s.fire_all_triggers),
            hold_threshold: Some(match s.hold_threshold {
                Some(v) => WireNumber::Num(v),
                None => WireNumber::Text("NaN".to_string()),
            }),
            hold_triggers: list(&s.hold_triggers),
            fire_all_hold_triggers: WireFlag::Bool(s.fire_all_hold_triggers),
        }
    }
}

/// Steps arrive either bare or wrapped as `{"type": ..., "data": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireStepEntry {
    Wrapped { data: WireStep },
    Bare(WireStep),
}

impl WireStepEntry {
    fn into_step(self, axis: Axis) -> Result<Step, TestbedError> {
        match self {
            WireStepEntry::Wrapped { data } | WireStepEntry::Bare(data) => data.into_step(axis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UI_SEQUENCE: &str = r#"{
        "Z": [{
            "type": "move-z-axis",
            "data": {
                "direction": "negative",
                "stepSize": "2",
                "moveInitTriggers": [],
                "fireAllInitTriggers": "False",
                "triggers": [{"triggerType": "Fz (N)", "comparator": ">=", "value": 2.0}],
                "fireAllTriggers": "True",
                "holdThreshold": "1.5",
                "holdTriggers": [{"triggerType": "duration (sec)", "comparator": ">", "value": "30"}],
                "fireAllHoldTriggers": "False",
                "axis": "Z"
            }
        }],
        "X": [],
        "repeat": "3"
    }"#;

    #[test]
    fn test_parse_ui_sequence() {
        let seq = Sequence::from_json(UI_SEQUENCE).unwrap();
        assert_eq!(seq.repeat, 3);
        assert_eq!(seq.active_axes().count(), 1);

        let step = &seq.programs[&Axis::Z].steps[0];
        assert_eq!(step.axis, Axis::Z);
        assert_eq!(step.direction, Direction::Negative);
        assert_eq!(step.pulse_width, Duration::from_millis(2));
        assert!(step.fire_all_triggers);
        assert!(!step.fire_all_hold_triggers);
        assert_eq!(step.hold_threshold, Some(1.5));
        assert_eq!(
            step.triggers[0],
            Trigger::force(ForceAxis::Fz, Comparator::Ge, 2.0)
        );
        assert_eq!(step.hold_triggers[0].kind, TriggerKind::Duration);
        assert_eq!(step.hold_triggers[0].value, 30.0);
    }

    #[test]
    fn test_parse_bare_steps_and_defaults() {
        let json = r#"{"X": [{"direction": "positive", "stepSize": 1, "holdThreshold": "NaN"}]}"#;
        let seq = Sequence::from_json(json).unwrap();
        assert_eq!(seq.repeat, 1);
        let step = &seq.programs[&Axis::X].steps[0];
        assert_eq!(step.hold_threshold, None);
        assert!(step.triggers.is_empty());
        assert!(!step.fire_all_init_triggers);
    }

    #[test]
    fn test_unknown_trigger_type_is_reported() {
        let json = r#"{"X": [{"direction": "positive", "stepSize": 1,
            "triggers": [{"triggerType": "torque (Nm)", "comparator": ">", "value": 1}]}]}"#;
        assert!(matches!(
            Sequence::from_json(json),
            Err(TestbedError::UnknownTriggerType(t)) if t == "torque (Nm)"
        ));
    }

    #[test]
    fn test_unknown_comparator_is_reported() {
        let json = r#"{"X": [{"direction": "positive", "stepSize": 1,
            "triggers": [{"triggerType": "steps", "comparator": "!=", "value": 1}]}]}"#;
        assert!(matches!(
            Sequence::from_json(json),
            Err(TestbedError::UnknownComparator(c)) if c == "!="
        ));
    }

    #[test]
    fn test_invalid_axis_key() {
        let json = r#"{"W": []}"#;
        assert!(matches!(
            Sequence::from_json(json),
            Err(TestbedError::InvalidAxis(_))
        ));
    }

    #[test]
    fn test_trigger_kind_parsing() {
        assert_eq!(
            "F_shear (N)".parse::<TriggerKind>().unwrap(),
            TriggerKind::Force(ForceAxis::Shear)
        );
        assert_eq!("steps".parse::<TriggerKind>().unwrap(), TriggerKind::Steps);
        assert_eq!(
            "Z (mm)".parse::<TriggerKind>().unwrap(),
            TriggerKind::Distance("Z".to_string())
        );
        assert!("Fq (N)".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn test_trigger_from_display_form() {
        let t: Trigger = "Fz (N) >= 2.5".parse().unwrap();
        assert_eq!(t, Trigger::force(ForceAxis::Fz, Comparator::Ge, 2.5));
        assert_eq!(t.to_string().parse::<Trigger>().unwrap(), t);

        let t: Trigger = "steps<10".parse().unwrap();
        assert_eq!(t, Trigger::new(TriggerKind::Steps, Comparator::Lt, 10.0));

        assert!(matches!(
            "Fz (N) => 1".parse::<Trigger>(),
            Err(TestbedError::UnknownComparator(_))
        ));
        assert!(matches!(
            "duration 5".parse::<Trigger>(),
            Err(TestbedError::UnknownComparator(_))
        ));
    }

    #[test]
    fn test_comparator_relations() {
        assert!(Comparator::Ge.compare(2.0, 2.0));
        assert!(!Comparator::Gt.compare(2.0, 2.0));
        assert!(Comparator::Lt.compare(1.0, 2.0));
        assert!(Comparator::Eq.compare(3.0, 3.0));
        assert!(Comparator::Le.compare(-1.0, 0.0));
    }

    #[test]
    fn test_wire_rendering_reparses() {
        let seq = Sequence::from_json(UI_SEQUENCE).unwrap();
        let again = Sequence::from_value(seq.to_json()).unwrap();
        assert_eq!(seq, again);
    }

    #[test]
    fn test_non_positive_step_size_rejected() {
        let json = r#"{"X": [{"direction": "positive", "stepSize": 0}]}"#;
        assert!(matches!(
            Sequence::from_json(json),
            Err(TestbedError::InvalidSequence(_))
        ));
    }
}
