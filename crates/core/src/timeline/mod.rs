use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Location, Stage},
    BuildError, CameraEvent, Difficulty, ExpressionEvent, MoveEvent, Result,
};

/// First index of a choreography track (0-based measures).
pub const MOVE_TRACK_START: u32 = 0;
/// First index of a camera track (1-based beats).
pub const CAMERA_TRACK_START: u32 = 1;

/// Dense index -> value track. Every index in `[first, last]` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Track<T> {
    entries: BTreeMap<u32, T>,
}

impl<T> Default for Track<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Track<T> {
    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(&index)
    }

    pub fn first_index(&self) -> Option<u32> {
        self.entries.keys().next().copied()
    }

    pub fn last_index(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.entries.iter().map(|(index, value)| (*index, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values()
    }

    /// Applies `f` to every entry, keeping the indices.
    pub fn try_map<U>(&self, mut f: impl FnMut(u32, &T) -> Result<U>) -> Result<Track<U>> {
        let mut entries = BTreeMap::new();
        for (index, value) in &self.entries {
            entries.insert(*index, f(*index, value)?);
        }
        Ok(Track { entries })
    }
}

/// Forward-fills a sparse index -> value mapping over `[start, max]`.
///
/// Later duplicates of an index replace earlier ones. Fails when `start` has
/// no explicit entry or when an entry precedes `start`.
pub fn densify<T: Clone>(
    stage: Stage,
    track_name: &str,
    start: u32,
    sparse: impl IntoIterator<Item = (u32, T)>,
) -> Result<Track<T>> {
    let mut explicit = BTreeMap::new();
    for (index, value) in sparse {
        if explicit.insert(index, value).is_some() {
            tracing::warn!(track = track_name, index, "duplicate entry, keeping the later one");
        }
    }

    if let Some(&first) = explicit.keys().next() {
        if first < start {
            return Err(BuildError::at(
                stage,
                Location::Index(first),
                format!("{track_name} track has an entry before its first index {start}"),
            ));
        }
    }

    let Some(&last) = explicit.keys().next_back() else {
        return Err(BuildError::at(
            stage,
            Location::Index(start),
            format!("missing first entry in {track_name} track"),
        ));
    };
    if !explicit.contains_key(&start) {
        return Err(BuildError::at(
            stage,
            Location::Index(start),
            format!("missing first entry in {track_name} track"),
        ));
    }

    let mut entries = BTreeMap::new();
    let mut current: Option<T> = None;
    for index in start..=last {
        if let Some(value) = explicit.remove(&index) {
            current = Some(value);
        }
        if let Some(value) = &current {
            entries.insert(index, value.clone());
        }
    }

    Ok(Track { entries })
}

/// Densifies one difficulty's choreography. Measures are 1-based on input
/// and 0-based in the resulting track.
pub fn densify_moves(difficulty: Difficulty, events: &[MoveEvent]) -> Result<Track<MoveEvent>> {
    let mut sparse = Vec::with_capacity(events.len());
    for event in events {
        let Some(index) = event.measure.checked_sub(1) else {
            return Err(BuildError::at_measure(
                Stage::Choreography,
                event.measure,
                format!("move `{}` placed before measure 1", event.move_name),
            ));
        };
        sparse.push((index, event.clone()));
    }

    let name = format!("{difficulty} move");
    densify(Stage::Choreography, &name, MOVE_TRACK_START, sparse)
}

pub fn densify_cameras(difficulty: Difficulty, events: &[CameraEvent]) -> Result<Track<String>> {
    let name = format!("{difficulty} camera");
    densify(
        Stage::Camera,
        &name,
        CAMERA_TRACK_START,
        events
            .iter()
            .map(|event| (event.beat, event.position.clone())),
    )
}

/// Expression tracks start wherever the first explicit event sits.
pub fn densify_expressions(events: &[ExpressionEvent]) -> Result<Track<String>> {
    let Some(start) = events.iter().map(|event| event.beat).min() else {
        return Ok(Track::default());
    };
    densify(
        Stage::Expression,
        "expression",
        start,
        events.iter().map(|event| (event.beat, event.name.clone())),
    )
}
