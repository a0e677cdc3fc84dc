//! Practice mode sections.
//!
//! Each user-defined section becomes a run of `learn` steps (one move and the
//! move that follows it) closed by a single `review` step over the whole run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::Stage, naming, BuildError, Difficulty, MoveEvent, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepKind {
    Learn,
    Review,
}

wire_enum!(StepKind, "practice step type" {
    Learn => "learn",
    Review => "review",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Short name of the first move.
    pub start: String,
    /// Short name of the move the step leads into.
    pub end: String,
    /// True when `end` was taken from a later section.
    pub boundary: bool,
    /// 1-based measure of the starting move.
    pub measure: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSection {
    pub index: usize,
    pub steps: Vec<PracticeStep>,
}

/// Origin and song a short name belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRef {
    pub origin: String,
    pub song: String,
}

/// Compiled practice data for one difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticePlan {
    pub sections: Vec<PracticeSection>,
    pub song_names: BTreeMap<String, SongRef>,
}

impl PracticePlan {
    pub fn steps(&self) -> impl Iterator<Item = &PracticeStep> + '_ {
        self.sections.iter().flat_map(|section| section.steps.iter())
    }
}

fn event_short_name(event: &MoveEvent) -> String {
    naming::short_name(&event.move_name, &event.move_song)
}

/// First move of the first non-empty section after `section`.
fn next_section_move(sections: &[Vec<MoveEvent>], section: usize) -> Option<&MoveEvent> {
    sections
        .iter()
        .skip(section + 1)
        .find_map(|moves| moves.first())
}

#[tracing::instrument(skip(sections), fields(sections = sections.len()))]
pub fn compile_practice(difficulty: Difficulty, sections: &[Vec<MoveEvent>]) -> Result<PracticePlan> {
    let mut plan = PracticePlan::default();
    let last_section = sections.len().saturating_sub(1);

    for (section_index, moves) in sections.iter().enumerate() {
        let mut steps = Vec::with_capacity(moves.len() + 1);

        for (move_index, event) in moves.iter().enumerate() {
            let start = event_short_name(event);
            plan.song_names.entry(start.clone()).or_insert_with(|| SongRef {
                origin: event.move_origin.clone(),
                song: event.move_song.clone(),
            });

            let is_last_in_section = move_index + 1 == moves.len();
            if section_index == last_section && is_last_in_section {
                continue;
            }

            let (next, boundary) = match moves.get(move_index + 1) {
                Some(next) => (next, false),
                None => match next_section_move(sections, section_index) {
                    Some(next) => (next, true),
                    None => {
                        return Err(BuildError::at_measure(
                            Stage::Practice,
                            event.measure,
                            format!(
                                "no next move found after `{start}` in {difficulty} section {section_index}"
                            ),
                        ))
                    }
                },
            };

            steps.push(PracticeStep {
                kind: StepKind::Learn,
                start,
                end: event_short_name(next),
                boundary,
                measure: event.measure,
            });
        }

        if let (Some(first), Some(last)) = (steps.first(), steps.last()) {
            let review = PracticeStep {
                kind: StepKind::Review,
                start: first.start.clone(),
                end: last.end.clone(),
                boundary: last.boundary,
                measure: first.measure,
            };
            steps.push(review);
        }

        plan.sections.push(PracticeSection {
            index: section_index,
            steps,
        });
    }

    tracing::debug!(
        %difficulty,
        steps = plan.steps().count(),
        "compiled practice sections"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(measure: u32, short: &str) -> MoveEvent {
        MoveEvent {
            measure,
            clip: format!("{short}_a"),
            move_origin: "dc1".to_string(),
            move_song: "gonow".to_string(),
            move_name: format!("{short}_gonow.move"),
        }
    }

    fn pairs(section: &PracticeSection) -> Vec<(StepKind, &str, &str)> {
        section
            .steps
            .iter()
            .map(|step| (step.kind, step.start.as_str(), step.end.as_str()))
            .collect()
    }

    #[test]
    fn learn_steps_chain_across_sections() {
        let sections = vec![
            vec![event(1, "wave"), event(2, "clap")],
            vec![],
            vec![event(5, "step"), event(6, "spin")],
        ];
        let plan = compile_practice(Difficulty::Easy, &sections).unwrap();

        assert_eq!(
            pairs(&plan.sections[0]),
            vec![
                (StepKind::Learn, "wave", "clap"),
                (StepKind::Learn, "clap", "step"),
                (StepKind::Review, "wave", "step"),
            ]
        );
        assert!(plan.sections[0].steps[1].boundary);
        assert!(plan.sections[1].steps.is_empty());
        assert_eq!(
            pairs(&plan.sections[2]),
            vec![
                (StepKind::Learn, "step", "spin"),
                (StepKind::Review, "step", "spin"),
            ]
        );
    }

    #[test]
    fn song_names_are_keyed_by_short_name() {
        let sections = vec![vec![event(1, "wave"), event(2, "clap")]];
        let plan = compile_practice(Difficulty::Expert, &sections).unwrap();

        assert_eq!(plan.song_names.len(), 2);
        assert_eq!(plan.song_names["clap"].song, "gonow");
        assert_eq!(plan.song_names["wave"].origin, "dc1");
    }

    #[test]
    fn trailing_empty_section_leaves_no_next_move() {
        let sections = vec![vec![event(1, "wave"), event(2, "clap")], vec![]];
        let err = compile_practice(Difficulty::Medium, &sections).unwrap_err();
        assert!(err.to_string().contains("no next move found"));
        assert_eq!(err.stage(), Some(Stage::Practice));
    }

    #[test]
    fn single_move_final_section_has_no_steps() {
        let sections = vec![vec![event(1, "wave")], vec![event(2, "clap")]];
        let plan = compile_practice(Difficulty::Easy, &sections).unwrap();
        assert_eq!(
            pairs(&plan.sections[0]),
            vec![
                (StepKind::Learn, "wave", "clap"),
                (StepKind::Review, "wave", "clap"),
            ]
        );
        assert!(plan.sections[1].steps.is_empty());
    }
}
