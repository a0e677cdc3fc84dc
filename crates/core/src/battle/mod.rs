//! Battle mode timeline.
//!
//! Editorial battle events open and close solo/minigame intervals after a
//! single `battle_start`. The compiled timeline covers every measure of the
//! song: the closed intervals, plus "bridge" steps of normal play in between.

use serde::{Deserialize, Serialize};

use crate::{error::Stage, BuildError, Result};

/// Minimum length of a minigame, counting both endpoints.
pub const MIN_MINIGAME_MEASURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BattleEventKind {
    BattleStart,
    P1SoloStart,
    P1SoloEnd,
    P2SoloStart,
    P2SoloEnd,
    MinigameStart,
    MinigameEnd,
}

wire_enum!(BattleEventKind, "battle event type" {
    BattleStart => "battle_start",
    P1SoloStart => "p1_solo_start",
    P1SoloEnd => "p1_solo_end",
    P2SoloStart => "p2_solo_start",
    P2SoloEnd => "p2_solo_end",
    MinigameStart => "minigame_start",
    MinigameEnd => "minigame_end",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub measure: u32,
    #[serde(rename = "type")]
    pub kind: BattleEventKind,
}

impl BattleEvent {
    pub fn new(measure: u32, kind: BattleEventKind) -> Self {
        Self { measure, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Players {
    Both,
    P1,
    P2,
}

wire_enum!(Players, "players" {
    Both => "both",
    P1 => "p1",
    P2 => "p2",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepState {
    Normal,
    Solo,
    Minigame,
}

wire_enum!(StepState, "battle step state" {
    Normal => "normal",
    Solo => "solo",
    Minigame => "minigame",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BattleCamera {
    Normal,
    P1Solo,
    P2Solo,
    Minigame,
}

wire_enum!(BattleCamera, "battle camera" {
    Normal => "normal",
    P1Solo => "p1_solo",
    P2Solo => "p2_solo",
    Minigame => "minigame",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NonplayAction {
    None,
    Watch,
    Idle,
}

wire_enum!(NonplayAction, "nonplay action" {
    None => "none",
    Watch => "watch",
    Idle => "idle",
});

/// Inclusive measure range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureRange {
    pub start: u32,
    pub end: u32,
}

impl MeasureRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStep {
    pub players: Players,
    pub music_range: MeasureRange,
    /// `None` for bridges that end before the battle starts.
    pub play_range: Option<MeasureRange>,
    pub camera: BattleCamera,
    pub nonplay_action: NonplayAction,
    pub state: StepState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalKind {
    P1Solo,
    P2Solo,
    Minigame,
}

impl IntervalKind {
    const ALL: [IntervalKind; 3] = [IntervalKind::P1Solo, IntervalKind::P2Solo, IntervalKind::Minigame];

    fn slot(self) -> usize {
        match self {
            IntervalKind::P1Solo => 0,
            IntervalKind::P2Solo => 1,
            IntervalKind::Minigame => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            IntervalKind::P1Solo => "player 1 solo",
            IntervalKind::P2Solo => "player 2 solo",
            IntervalKind::Minigame => "minigame",
        }
    }

    fn step(self, range: MeasureRange) -> BattleStep {
        let (players, camera, nonplay_action, state) = match self {
            IntervalKind::P1Solo => (Players::P1, BattleCamera::P1Solo, NonplayAction::Watch, StepState::Solo),
            IntervalKind::P2Solo => (Players::P2, BattleCamera::P2Solo, NonplayAction::Watch, StepState::Solo),
            IntervalKind::Minigame => (
                Players::Both,
                BattleCamera::Minigame,
                NonplayAction::None,
                StepState::Minigame,
            ),
        };
        BattleStep {
            players,
            music_range: range,
            play_range: Some(range),
            camera,
            nonplay_action,
            state,
        }
    }
}

enum Transition {
    BattleStart,
    Open(IntervalKind),
    Close(IntervalKind),
}

impl BattleEventKind {
    /// Processing order among events on the same measure.
    fn rank(self) -> u8 {
        match self.transition() {
            Transition::BattleStart => 0,
            Transition::Open(_) => 1,
            Transition::Close(_) => 2,
        }
    }

    fn transition(self) -> Transition {
        match self {
            BattleEventKind::BattleStart => Transition::BattleStart,
            BattleEventKind::P1SoloStart => Transition::Open(IntervalKind::P1Solo),
            BattleEventKind::P1SoloEnd => Transition::Close(IntervalKind::P1Solo),
            BattleEventKind::P2SoloStart => Transition::Open(IntervalKind::P2Solo),
            BattleEventKind::P2SoloEnd => Transition::Close(IntervalKind::P2Solo),
            BattleEventKind::MinigameStart => Transition::Open(IntervalKind::Minigame),
            BattleEventKind::MinigameEnd => Transition::Close(IntervalKind::Minigame),
        }
    }
}

/// Validated state of the event stream.
#[derive(Debug, Default)]
struct BattleState {
    started: Option<u32>,
    open: [Option<u32>; 3],
    closed: Vec<(IntervalKind, MeasureRange)>,
}

impl BattleState {
    fn apply(&mut self, event: &BattleEvent) -> Result<()> {
        let measure = event.measure;
        match event.kind.transition() {
            Transition::BattleStart => {
                if let Some(first) = self.started {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        measure,
                        format!("duplicate battle start, battle already started at measure {first}"),
                    ));
                }
                self.started = Some(measure);
            }
            Transition::Open(kind) => {
                if self.started.is_none() {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        measure,
                        format!("{} starts before the battle start", kind.label()),
                    ));
                }
                if let Some(open_at) = self.open[kind.slot()] {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        measure,
                        format!("{} already open since measure {open_at}", kind.label()),
                    ));
                }
                if let Some(other) = IntervalKind::ALL
                    .into_iter()
                    .find(|other| *other != kind && self.open[other.slot()].is_some())
                {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        measure,
                        format!("{} collides with open {}", kind.label(), other.label()),
                    ));
                }
                if let Some(last_end) = self.closed.iter().map(|(_, range)| range.end).max() {
                    if measure <= last_end {
                        return Err(BuildError::at_measure(
                            Stage::Battle,
                            measure,
                            format!(
                                "{} collides with an interval ending at measure {last_end}",
                                kind.label()
                            ),
                        ));
                    }
                }
                self.open[kind.slot()] = Some(measure);
            }
            Transition::Close(kind) => {
                let Some(start) = self.open[kind.slot()].take() else {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        measure,
                        format!("{} ends without a matching start", kind.label()),
                    ));
                };
                let range = MeasureRange::new(start, measure);
                if kind == IntervalKind::Minigame && range.len() < MIN_MINIGAME_MEASURES {
                    return Err(BuildError::at_measure(
                        Stage::Battle,
                        start,
                        format!(
                            "minigame spans {} measures, at least {MIN_MINIGAME_MEASURES} are required",
                            range.len()
                        ),
                    ));
                }
                self.closed.push((kind, range));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(u32, Vec<(IntervalKind, MeasureRange)>)> {
        let Some(started) = self.started else {
            return Err(BuildError::validation(Stage::Battle, "no battle start event"));
        };
        for kind in IntervalKind::ALL {
            if let Some(start) = self.open[kind.slot()] {
                return Err(BuildError::at_measure(
                    Stage::Battle,
                    start,
                    format!("{} is never closed", kind.label()),
                ));
            }
        }
        Ok((started, self.closed))
    }
}

fn bridge(range: MeasureRange, battle_start: u32) -> BattleStep {
    let play_start = range.start.max(battle_start);
    let play_range = (play_start <= range.end).then(|| MeasureRange::new(play_start, range.end));
    BattleStep {
        players: Players::Both,
        music_range: range,
        nonplay_action: if play_range.is_some() {
            NonplayAction::None
        } else {
            NonplayAction::Idle
        },
        play_range,
        camera: BattleCamera::Normal,
        state: StepState::Normal,
    }
}

/// Compiles battle events into steps that tile `[0, total_measures - 1]`.
///
/// Bridges come first in measure order, followed by solo and minigame steps
/// in the order their end events were seen.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn compile_battle(events: &[BattleEvent], total_measures: u32) -> Result<Vec<BattleStep>> {
    let Some(last_measure) = total_measures.checked_sub(1) else {
        return Err(BuildError::validation(Stage::Battle, "song has no measures"));
    };

    let mut sorted = events.to_vec();
    sorted.sort_by_key(|event| (event.measure, event.kind.rank()));

    let mut state = BattleState::default();
    for event in &sorted {
        if event.measure > last_measure {
            return Err(BuildError::at_measure(
                Stage::Battle,
                event.measure,
                format!("{} lies past the last measure {last_measure}", event.kind),
            ));
        }
        state.apply(event)?;
    }
    let (battle_start, intervals) = state.finish()?;

    let mut ranges: Vec<MeasureRange> = intervals.iter().map(|(_, range)| *range).collect();
    ranges.sort_by_key(|range| range.start);

    let mut steps = Vec::with_capacity(intervals.len() * 2 + 1);
    let mut cursor = 0;
    for range in &ranges {
        if range.start > cursor {
            steps.push(bridge(MeasureRange::new(cursor, range.start - 1), battle_start));
        }
        cursor = range.end + 1;
    }
    if cursor <= last_measure {
        steps.push(bridge(MeasureRange::new(cursor, last_measure), battle_start));
    }

    steps.extend(intervals.into_iter().map(|(kind, range)| kind.step(range)));
    tracing::debug!(steps = steps.len(), battle_start, "compiled battle timeline");
    Ok(steps)
}
