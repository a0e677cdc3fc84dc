use serde::{Deserialize, Serialize};

use crate::{
    library::{ImportSession, MoveKey},
    error::Stage,
    naming,
    practice::{PracticePlan, StepKind},
    BuildError, Result,
};

/// Single pose sample of a move's frame sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Beat of the frame relative to the start of its move.
    pub beat: f32,
    /// Song beat the owning sequence is placed at.
    #[serde(default)]
    pub beat_offset: f32,
    #[serde(default)]
    pub pose: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceHeader {
    pub version: u32,
    pub skeleton: String,
    pub frames_per_beat: u32,
}

impl Default for SequenceHeader {
    fn default() -> Self {
        Self {
            version: 1,
            skeleton: "default".to_string(),
            frames_per_beat: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSequence {
    pub name: String,
    #[serde(default)]
    pub header: SequenceHeader,
    #[serde(default)]
    pub frames: Vec<PoseFrame>,
}

/// Expands practice steps into pose-frame sequences.
///
/// Library sequences are only read; each learn step gets a fresh copy whose
/// frames are placed at the step's song beat, and each review step gets the
/// concatenation of the learn sequences before it in the section.
#[tracing::instrument(skip_all)]
pub fn compile_sequences(
    plan: &PracticePlan,
    session: &mut ImportSession<'_>,
    beats_per_measure: u32,
) -> Result<Vec<FrameSequence>> {
    let mut sequences = Vec::new();

    for section in &plan.sections {
        let mut pending = Vec::new();
        let mut header: Option<SequenceHeader> = None;

        for step in &section.steps {
            match step.kind {
                StepKind::Learn => {
                    let Some(song) = plan.song_names.get(&step.start) else {
                        tracing::warn!(step = %step.start, "no song for practice step, skipping");
                        continue;
                    };
                    let key = MoveKey::new(
                        song.origin.as_str(),
                        song.song.as_str(),
                        naming::qualified_name(&step.start, &song.song),
                    );
                    let beat_offset = step
                        .measure
                        .saturating_sub(1)
                        .checked_mul(beats_per_measure)
                        .ok_or_else(|| {
                            BuildError::at_measure(
                                Stage::FrameSequence,
                                step.measure,
                                format!("practice step `{}` starts out of range", step.start),
                            )
                        })? as f32;
                    let source = session.source_sequence(&key)?;

                    let sequence = FrameSequence {
                        name: format!("learn_{}_{}", step.start, step.end),
                        header: source.header.clone(),
                        frames: source
                            .frames
                            .iter()
                            .map(|frame| PoseFrame {
                                beat_offset,
                                ..frame.clone()
                            })
                            .collect(),
                    };

                    pending.extend(sequence.frames.iter().cloned());
                    header = Some(sequence.header.clone());
                    sequences.push(sequence);
                }
                StepKind::Review => {
                    sequences.push(FrameSequence {
                        name: format!("review_{}_{}", step.start, step.end),
                        header: header.clone().unwrap_or_default(),
                        frames: std::mem::take(&mut pending),
                    });
                }
            }
        }
    }

    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        library::InMemoryMoveLibrary,
        practice::{PracticeSection, PracticeStep, SongRef},
    };

    fn source(name: &str, frames: usize) -> FrameSequence {
        FrameSequence {
            name: name.to_string(),
            header: SequenceHeader {
                version: 3,
                skeleton: name.to_string(),
                frames_per_beat: 4,
            },
            frames: (0..frames)
                .map(|i| PoseFrame {
                    beat: i as f32 * 0.25,
                    beat_offset: 0.0,
                    pose: vec![i as f32],
                })
                .collect(),
        }
    }

    fn step(kind: StepKind, start: &str, end: &str, measure: u32) -> PracticeStep {
        PracticeStep {
            kind,
            start: start.to_string(),
            end: end.to_string(),
            boundary: false,
            measure,
        }
    }

    fn plan() -> PracticePlan {
        let mut plan = PracticePlan::default();
        for short in ["wave", "clap"] {
            plan.song_names.insert(
                short.to_string(),
                SongRef {
                    origin: "dc1".to_string(),
                    song: "gonow".to_string(),
                },
            );
        }
        plan.sections.push(PracticeSection {
            index: 0,
            steps: vec![
                step(StepKind::Learn, "wave", "clap", 1),
                step(StepKind::Learn, "clap", "spin", 3),
                step(StepKind::Learn, "ghost", "spin", 4),
                step(StepKind::Review, "wave", "spin", 1),
            ],
        });
        plan
    }

    fn library() -> InMemoryMoveLibrary {
        let mut library = InMemoryMoveLibrary::new();
        library.insert_sequence(MoveKey::new("dc1", "gonow", "wave_gonow"), source("wave", 2));
        library.insert_sequence(MoveKey::new("dc1", "gonow", "clap_gonow"), source("clap", 3));
        library
    }

    #[test]
    fn learn_frames_are_restamped_copies() {
        let library = library();
        let mut session = ImportSession::new(&library);
        let sequences = compile_sequences(&plan(), &mut session, 4).unwrap();

        assert_eq!(sequences[0].name, "learn_wave_clap");
        assert!(sequences[0].frames.iter().all(|f| f.beat_offset == 0.0));
        assert!(sequences[1].frames.iter().all(|f| f.beat_offset == 8.0));
        assert_eq!(sequences[1].frames[2].beat, 0.5);

        let untouched = session
            .source_sequence(&MoveKey::new("dc1", "gonow", "clap_gonow"))
            .unwrap();
        assert!(untouched.frames.iter().all(|f| f.beat_offset == 0.0));
    }

    #[test]
    fn review_concatenates_section_frames() {
        let library = library();
        let mut session = ImportSession::new(&library);
        let sequences = compile_sequences(&plan(), &mut session, 4).unwrap();

        // the `ghost` step has no song and is skipped
        assert_eq!(sequences.len(), 3);
        let review = &sequences[2];
        assert_eq!(review.name, "review_wave_spin");
        assert_eq!(review.frames.len(), 5);
        assert_eq!(review.header.skeleton, "clap");
    }

    #[test]
    fn review_without_learn_frames_uses_default_header() {
        let mut plan = PracticePlan::default();
        plan.sections.push(PracticeSection {
            index: 0,
            steps: vec![step(StepKind::Review, "wave", "clap", 1)],
        });
        let library = InMemoryMoveLibrary::new();
        let mut session = ImportSession::new(&library);
        let sequences = compile_sequences(&plan, &mut session, 4).unwrap();
        assert_eq!(sequences[0].header, SequenceHeader::default());
        assert!(sequences[0].frames.is_empty());
    }

    #[test]
    fn missing_library_sequence_aborts() {
        let library = InMemoryMoveLibrary::new();
        let mut session = ImportSession::new(&library);
        assert!(compile_sequences(&plan(), &mut session, 4).is_err());
    }

    #[test]
    fn out_of_range_step_measure_is_rejected() {
        let mut plan = plan();
        plan.sections[0].steps[0].measure = u32::MAX;
        let library = library();
        let mut session = ImportSession::new(&library);

        let err = compile_sequences(&plan, &mut session, 4).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::FrameSequence));
    }
}
