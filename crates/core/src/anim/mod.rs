use serde::{Deserialize, Serialize};

use crate::{library::Move, timeline::Track};

/// Animation-curve units per track index in the target engine.
pub const UNITS_PER_INDEX: i64 = 60;

/// Keyframe time of a dense track index.
pub fn anim_time(index: i64) -> i64 {
    (index - 1) * UNITS_PER_INDEX
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: i64,
    pub value: String,
}

/// Symbolic keyframe lists for one difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimEvents {
    pub clips: Vec<Keyframe>,
    pub moves: Vec<Keyframe>,
    pub cameras: Vec<Keyframe>,
    pub expressions: Vec<Keyframe>,
}

pub fn keyframes<T>(
    track: &Track<T>,
    mut value: impl FnMut(&T) -> String,
) -> Vec<Keyframe> {
    track
        .iter()
        .map(|(index, entry)| Keyframe {
            time: anim_time(i64::from(index)),
            value: value(entry),
        })
        .collect()
}

pub fn emit_anim(
    moves: Option<&Track<Move>>,
    cameras: Option<&Track<String>>,
    expressions: &Track<String>,
) -> AnimEvents {
    let mut events = AnimEvents::default();
    if let Some(moves) = moves {
        events.clips = keyframes(moves, |mv| mv.clip.clone());
        events.moves = keyframes(moves, |mv| mv.name.clone());
    }
    if let Some(cameras) = cameras {
        events.cameras = keyframes(cameras, String::clone);
    }
    events.expressions = keyframes(expressions, String::clone);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Stage, timeline::densify};

    #[test]
    fn time_formula_is_fixed() {
        assert_eq!(anim_time(1), 0);
        assert_eq!(anim_time(2), 60);
        assert_eq!(anim_time(0), -60);
    }

    #[test]
    fn camera_beats_map_to_keyframes() {
        let cameras = densify(
            Stage::Camera,
            "cam",
            1,
            vec![(1, "near".to_string()), (3, "far".to_string())],
        )
        .unwrap();
        let events = emit_anim(None, Some(&cameras), &Track::default());

        let times: Vec<(i64, &str)> = events
            .cameras
            .iter()
            .map(|k| (k.time, k.value.as_str()))
            .collect();
        assert_eq!(times, vec![(0, "near"), (60, "near"), (120, "far")]);
        assert!(events.moves.is_empty());
        assert!(events.expressions.is_empty());
    }

    #[test]
    fn every_category_uses_the_track_index() {
        let expressions = densify(
            Stage::Expression,
            "expr",
            0,
            vec![(0, "smile".to_string()), (2, "frown".to_string())],
        )
        .unwrap();
        let frames = keyframes(&expressions, String::clone);

        let times: Vec<i64> = frames.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![-60, 0, 60]);
        assert_eq!(frames[1].value, "smile");
    }
}
