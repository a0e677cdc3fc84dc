//! Move library access.
//!
//! On disk the library is laid out as `<root>/<origin>/<song>/<move>/` with a
//! `move.json` metadata sidecar and a `sequence.json` pose-frame sequence.

use std::{
    collections::{hash_map::Entry, BTreeMap, HashMap},
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{naming, timeline::Track, BuildError, FrameSequence, MoveEvent, Result};

pub const METADATA_FILE: &str = "move.json";
pub const SEQUENCE_FILE: &str = "sequence.json";

/// Fully-qualified move identity, `origin/song/move`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MoveKey {
    pub origin: String,
    pub song: String,
    pub name: String,
}

impl MoveKey {
    pub fn new(origin: impl Into<String>, song: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            song: song.into(),
            name: name.into(),
        }
    }

    pub fn from_event(event: &MoveEvent) -> Self {
        Self::new(
            event.move_origin.as_str(),
            event.move_song.as_str(),
            naming::strip_extension(&event.move_name),
        )
    }

    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.origin).join(&self.song).join(&self.name)
    }
}

impl fmt::Display for MoveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.origin, self.song, self.name)
    }
}

/// Per-clip record inside a move's metadata sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub era: String,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub links: Vec<String>,
}

/// Contents of `move.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveMetadata {
    pub name: String,
    #[serde(default)]
    pub internal_names: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub song_name: String,
    #[serde(default)]
    pub difficulty: u32,
    #[serde(default)]
    pub tempo_fit: f64,
    #[serde(default)]
    pub barks: Vec<String>,
    #[serde(default)]
    pub clips: BTreeMap<String, ClipMetadata>,
}

/// A choreography entry enriched with library metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub measure: u32,
    pub clip: String,
    pub key: MoveKey,
    pub name: String,
    pub display_name: String,
    pub song_name: String,
    pub genre: String,
    pub era: String,
    pub links: Vec<String>,
    pub tempo_fit: f64,
    pub flags: u32,
}

/// Read-only source of move metadata and pose-frame sequences.
pub trait MoveLibrary {
    fn load_move(&self, key: &MoveKey) -> Result<MoveMetadata>;
    fn load_sequence(&self, key: &MoveKey) -> Result<FrameSequence>;
}

/// Library rooted in a directory tree.
#[derive(Debug, Clone)]
pub struct FsMoveLibrary {
    root: PathBuf,
}

impl FsMoveLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_file(&self, key: &MoveKey, file: &str) -> Result<Vec<u8>> {
        let dir = self.root.join(key.relative_dir());
        if !dir.is_dir() {
            return Err(BuildError::resource(dir, format!("move `{key}` not found in library")));
        }
        let path = dir.join(file);
        if !path.is_file() {
            return Err(BuildError::resource(path, format!("move `{key}` has no {file}")));
        }
        Ok(std::fs::read(path)?)
    }
}

impl MoveLibrary for FsMoveLibrary {
    fn load_move(&self, key: &MoveKey) -> Result<MoveMetadata> {
        let bytes = self.read_file(key, METADATA_FILE)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn load_sequence(&self, key: &MoveKey) -> Result<FrameSequence> {
        let bytes = self.read_file(key, SEQUENCE_FILE)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Library held in memory, for embedders and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMoveLibrary {
    moves: BTreeMap<MoveKey, MoveMetadata>,
    sequences: BTreeMap<MoveKey, FrameSequence>,
}

impl InMemoryMoveLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_move(&mut self, key: MoveKey, metadata: MoveMetadata) {
        self.moves.insert(key, metadata);
    }

    pub fn insert_sequence(&mut self, key: MoveKey, sequence: FrameSequence) {
        self.sequences.insert(key, sequence);
    }
}

impl MoveLibrary for InMemoryMoveLibrary {
    fn load_move(&self, key: &MoveKey) -> Result<MoveMetadata> {
        self.moves.get(key).cloned().ok_or_else(|| {
            BuildError::resource(
                key.relative_dir().join(METADATA_FILE),
                format!("move `{key}` not found in library"),
            )
        })
    }

    fn load_sequence(&self, key: &MoveKey) -> Result<FrameSequence> {
        self.sequences.get(key).cloned().ok_or_else(|| {
            BuildError::resource(
                key.relative_dir().join(SEQUENCE_FILE),
                format!("move `{key}` has no {SEQUENCE_FILE}"),
            )
        })
    }
}

/// Per-build registry of everything read from the library. Each key is read
/// at most once for the lifetime of the session.
pub struct ImportSession<'a> {
    library: &'a dyn MoveLibrary,
    moves: HashMap<MoveKey, MoveMetadata>,
    sequences: HashMap<MoveKey, FrameSequence>,
}

impl<'a> ImportSession<'a> {
    pub fn new(library: &'a dyn MoveLibrary) -> Self {
        Self {
            library,
            moves: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    pub fn metadata(&mut self, key: &MoveKey) -> Result<&MoveMetadata> {
        match self.moves.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::debug!(%key, "loading move metadata");
                Ok(entry.insert(self.library.load_move(key)?))
            }
        }
    }

    /// Library source sequence; callers must clone before modifying.
    pub fn source_sequence(&mut self, key: &MoveKey) -> Result<&FrameSequence> {
        match self.sequences.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                tracing::debug!(%key, "loading move sequence");
                Ok(entry.insert(self.library.load_sequence(key)?))
            }
        }
    }

    pub fn imported_moves(&self) -> usize {
        self.moves.len()
    }

    pub fn resolve(&mut self, event: &MoveEvent) -> Result<Move> {
        let key = MoveKey::from_event(event);
        let metadata = self.metadata(&key)?;
        let Some(clip) = metadata.clips.get(&event.clip) else {
            return Err(BuildError::resource(
                key.relative_dir().join(METADATA_FILE),
                format!("clip `{}` is not part of move `{key}`", event.clip),
            ));
        };

        Ok(Move {
            measure: event.measure,
            clip: event.clip.clone(),
            name: metadata.name.clone(),
            display_name: metadata.display_name.clone(),
            song_name: metadata.song_name.clone(),
            genre: clip.genre.clone(),
            era: clip.era.clone(),
            links: clip.links.clone(),
            tempo_fit: metadata.tempo_fit,
            flags: clip.flags,
            key,
        })
    }

    pub fn resolve_track(&mut self, track: &Track<MoveEvent>) -> Result<Track<Move>> {
        track.try_map(|_, event| self.resolve(event))
    }
}

impl fmt::Debug for ImportSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportSession")
            .field("moves", &self.moves.len())
            .field("sequences", &self.sequences.len())
            .finish()
    }
}
