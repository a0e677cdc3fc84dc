//! Party-jump intervals.
//!
//! Start and end markers are paired into inclusive measure intervals. Only
//! one party jump can be open at a time.

use serde::{Deserialize, Serialize};

use crate::{error::Stage, BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartyJumpKind {
    Start,
    End,
}

wire_enum!(PartyJumpKind, "party jump marker" {
    Start => "start",
    End => "end",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyJumpEvent {
    pub measure: u32,
    #[serde(rename = "type")]
    pub kind: PartyJumpKind,
}

/// Inclusive `(start, end)` measure pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyJumpInterval {
    pub start: u32,
    pub end: u32,
}

/// Orders same-measure markers so an open jump is closed before the next
/// one starts, and a start on the measure of its own end comes first.
fn next_marker(group: &mut Vec<PartyJumpEvent>, open: Option<u32>) -> PartyJumpEvent {
    let wanted = if open.is_some() {
        PartyJumpKind::End
    } else {
        PartyJumpKind::Start
    };
    let index = group
        .iter()
        .position(|event| event.kind == wanted)
        .unwrap_or(0);
    group.remove(index)
}

/// Pairs start/end markers into intervals, in the order they close.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn compile_party_jumps(
    events: &[PartyJumpEvent],
    total_measures: u32,
) -> Result<Vec<PartyJumpInterval>> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|event| event.measure);

    let mut intervals = Vec::with_capacity(sorted.len() / 2);
    let mut open: Option<u32> = None;
    for group in sorted.chunk_by(|a, b| a.measure == b.measure) {
        let mut group = group.to_vec();
        while !group.is_empty() {
            let event = next_marker(&mut group, open);
            if event.measure >= total_measures {
                return Err(BuildError::at_measure(
                    Stage::PartyJump,
                    event.measure,
                    format!("party jump marker past the song's {total_measures} measures"),
                ));
            }

            match (event.kind, open) {
                (PartyJumpKind::Start, None) => open = Some(event.measure),
                (PartyJumpKind::Start, Some(start)) => {
                    return Err(BuildError::at_measure(
                        Stage::PartyJump,
                        event.measure,
                        format!("party jump start while the one from measure {start} is still open"),
                    ))
                }
                (PartyJumpKind::End, Some(start)) => {
                    intervals.push(PartyJumpInterval {
                        start,
                        end: event.measure,
                    });
                    open = None;
                }
                (PartyJumpKind::End, None) => {
                    return Err(BuildError::at_measure(
                        Stage::PartyJump,
                        event.measure,
                        "party jump end without a start",
                    ))
                }
            }
        }
    }

    if let Some(start) = open {
        return Err(BuildError::at_measure(
            Stage::PartyJump,
            start,
            "party jump start is never closed",
        ));
    }

    tracing::debug!(intervals = intervals.len(), "compiled party jumps");
    Ok(intervals)
}
