//! Editorial build request as produced by the authoring tool.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{BattleEvent, DrumTrack, PartyJumpEvent, Result, SongEvent, TempoChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Difficulty {
    Beginner,
    Easy,
    Medium,
    Expert,
}

wire_enum!(Difficulty, "difficulty" {
    Beginner => "beginner",
    Easy => "easy",
    Medium => "medium",
    Expert => "expert",
});

/// Packaging mode forwarded to the bundle manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionMode {
    #[default]
    None,
    Fast,
    Best,
}

wire_enum!(CompressionMode, "compression mode" {
    None => "none",
    Fast => "fast",
    Best => "best",
});

/// Sparse choreography entry placed by the editor. `measure` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub measure: u32,
    pub clip: String,
    pub move_origin: String,
    pub move_song: String,
    #[serde(rename = "move")]
    pub move_name: String,
}

/// Camera cut at a 1-based beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEvent {
    pub beat: u32,
    pub position: String,
}

/// Viseme or facial expression change at a 1-based beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionEvent {
    pub beat: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRepeat {
    pub phrase: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    /// Short song id; also the owning-song suffix of move names.
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub bpm: f64,
    #[serde(default)]
    pub preview_start: f64,
    #[serde(default)]
    pub preview_end: f64,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub year: Option<u32>,
}

/// Everything a single build consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub output_path: PathBuf,
    pub library_root: PathBuf,
    pub song: SongMetadata,
    pub total_measures: u32,
    #[serde(default)]
    pub compression: CompressionMode,
    #[serde(default)]
    pub moves: BTreeMap<Difficulty, Vec<MoveEvent>>,
    #[serde(default)]
    pub cameras: BTreeMap<Difficulty, Vec<CameraEvent>>,
    #[serde(default)]
    pub practice: BTreeMap<Difficulty, Vec<Vec<MoveEvent>>>,
    #[serde(default)]
    pub tempo: Vec<TempoChange>,
    #[serde(default)]
    pub beginner_moves: Vec<String>,
    #[serde(default)]
    pub drums: Vec<DrumTrack>,
    #[serde(default)]
    pub song_events: Vec<SongEvent>,
    #[serde(default)]
    pub party_jumps: Vec<PartyJumpEvent>,
    #[serde(default)]
    pub battle: Vec<BattleEvent>,
    #[serde(default)]
    pub phrase_repeats: Vec<PhraseRepeat>,
    #[serde(default)]
    pub visemes: Vec<ExpressionEvent>,
}

impl BuildRequest {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
