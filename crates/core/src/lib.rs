//! Core library for the dance song build pipeline.
//!
//! A build request describes a song sparsely: per-difficulty move and camera
//! timelines, battle and party-jump markers, practice groupings and a tempo
//! map. The modules here compile that description into dense, validated data
//! (move adjacency graph, battle steps, practice frame sequences, animation
//! keyframes) and a tick-accurate MIDI timing file. Each module owns one
//! compiler stage; [`pipeline`] runs them in order and commits the result.

#[macro_use]
mod wire;

pub mod anim;
pub mod assets;
pub mod battle;
pub mod config;
pub mod error;
pub mod graph;
pub mod library;
pub mod midi;
pub mod naming;
pub mod partyjump;
pub mod pipeline;
pub mod practice;
pub mod request;
pub mod sequence;
pub mod timeline;

pub use anim::{AnimEvents, Keyframe};
pub use assets::AssetStore;
pub use battle::{BattleEvent, BattleEventKind, BattleStep, MeasureRange};
pub use config::{BuildConfig, PathConfig, TimingConfig};
pub use error::{BuildError, Result};
pub use graph::{MoveGraph, MoveParent, MoveVariant};
pub use library::{FsMoveLibrary, ImportSession, InMemoryMoveLibrary, Move, MoveKey, MoveLibrary};
pub use midi::{DrumTrack, SongEvent, SongEventKind, TempoChange, TimingFile};
pub use partyjump::{PartyJumpEvent, PartyJumpInterval, PartyJumpKind};
pub use pipeline::{BuildOutput, BuildReport, CompiledSong};
pub use practice::{PracticePlan, PracticeSection, PracticeStep, StepKind};
pub use request::{
    BuildRequest, CameraEvent, CompressionMode, Difficulty, ExpressionEvent, MoveEvent,
    PhraseRepeat, SongMetadata,
};
pub use sequence::{FrameSequence, PoseFrame, SequenceHeader};
pub use timeline::Track;
