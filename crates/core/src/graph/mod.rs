//! Move adjacency graph.
//!
//! Clips are the graph nodes ([`MoveVariant`]); moves group them
//! ([`MoveParent`]). Adjacency is collected from every difficulty's playback
//! order and merged, so a clip used on several difficulties ends up with the
//! union of its neighbours.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{library::Move, timeline::Track, Difficulty};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveVariant {
    pub clip: String,
    pub parent: String,
    pub prev: BTreeSet<String>,
    pub next: BTreeSet<String>,
    pub genre: String,
    pub era: String,
    pub links: Vec<String>,
    pub flags: u32,
}

impl MoveVariant {
    fn from_move(mv: &Move) -> Self {
        Self {
            clip: mv.clip.clone(),
            parent: mv.name.clone(),
            prev: BTreeSet::new(),
            next: BTreeSet::new(),
            genre: mv.genre.clone(),
            era: mv.era.clone(),
            links: mv.links.clone(),
            flags: mv.flags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveParent {
    pub name: String,
    pub display_name: String,
    pub song_name: String,
    /// Clip names of the variants.
    pub variants: BTreeSet<String>,
    pub genres: BTreeSet<String>,
    pub eras: BTreeSet<String>,
    pub beginner: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveGraph {
    pub parents: BTreeMap<String, MoveParent>,
    pub variants: BTreeMap<String, MoveVariant>,
    /// Clip names per difficulty, in playback order.
    pub clip_order: BTreeMap<Difficulty, Vec<String>>,
}

impl MoveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from every difficulty's densified track.
    pub fn build<'a>(
        tracks: impl IntoIterator<Item = (Difficulty, &'a Track<Move>)>,
        beginner_moves: &[String],
    ) -> Self {
        let mut graph = Self::new();
        for (difficulty, track) in tracks {
            graph.add_track(difficulty, track);
        }
        graph.mark_beginner(beginner_moves);
        tracing::debug!(
            parents = graph.parents.len(),
            variants = graph.variants.len(),
            "built move graph"
        );
        graph
    }

    /// Merges one difficulty's adjacency into the graph and rewrites its
    /// clip order.
    pub fn add_track(&mut self, difficulty: Difficulty, track: &Track<Move>) {
        for (index, mv) in track.iter() {
            let prev = index
                .checked_sub(1)
                .and_then(|prev| track.get(prev))
                .map(|prev| prev.clip.clone());
            let next = track.get(index + 1).map(|next| next.clip.clone());

            let variant = self
                .variants
                .entry(mv.clip.clone())
                .or_insert_with(|| MoveVariant::from_move(mv));
            variant.prev.extend(prev);
            variant.next.extend(next);

            let parent = self
                .parents
                .entry(mv.name.clone())
                .or_insert_with(|| MoveParent {
                    name: mv.name.clone(),
                    display_name: mv.display_name.clone(),
                    song_name: mv.song_name.clone(),
                    variants: BTreeSet::new(),
                    genres: BTreeSet::new(),
                    eras: BTreeSet::new(),
                    beginner: false,
                });
            parent.variants.insert(mv.clip.clone());
            if !variant.genre.is_empty() {
                parent.genres.insert(variant.genre.clone());
            }
            if !variant.era.is_empty() {
                parent.eras.insert(variant.era.clone());
            }
        }

        let order = track.values().map(|mv| mv.clip.clone()).collect();
        self.clip_order.insert(difficulty, order);
    }

    pub fn mark_beginner(&mut self, beginner_moves: &[String]) {
        for name in beginner_moves {
            if let Some(parent) = self.parents.get_mut(name) {
                parent.beginner = true;
            } else {
                tracing::warn!(%name, "beginner move is not used by any difficulty");
            }
        }
    }

    pub fn variant(&self, clip: &str) -> Option<&MoveVariant> {
        self.variants.get(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Stage, library::MoveKey, timeline::densify};

    fn mv(clip: &str, name: &str, genre: &str) -> Move {
        Move {
            measure: 1,
            clip: clip.to_string(),
            key: MoveKey::new("dc1", "gonow", name),
            name: name.to_string(),
            display_name: name.to_uppercase(),
            song_name: "gonow".to_string(),
            genre: genre.to_string(),
            era: "00s".to_string(),
            links: Vec::new(),
            tempo_fit: 120.0,
            flags: 0,
        }
    }

    fn track(clips: &[(&str, &str)]) -> Track<Move> {
        densify(
            Stage::Choreography,
            "test",
            0,
            clips
                .iter()
                .enumerate()
                .map(|(i, (clip, name))| (i as u32, mv(clip, name, "pop"))),
        )
        .unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn adjacency_is_unioned_across_difficulties() {
        let easy = track(&[("a", "wave"), ("x", "clap"), ("b", "step")]);
        let expert = track(&[("c", "spin"), ("x", "clap"), ("d", "kick")]);
        let graph = MoveGraph::build(
            [(Difficulty::Easy, &easy), (Difficulty::Expert, &expert)],
            &[],
        );

        let shared = graph.variant("x").unwrap();
        assert_eq!(shared.prev, set(&["a", "c"]));
        assert_eq!(shared.next, set(&["b", "d"]));
        assert_eq!(graph.variants.values().filter(|v| v.clip == "x").count(), 1);
    }

    #[test]
    fn track_edges_have_no_outer_neighbours() {
        let easy = track(&[("a", "wave"), ("b", "clap")]);
        let graph = MoveGraph::build([(Difficulty::Easy, &easy)], &[]);

        assert!(graph.variant("a").unwrap().prev.is_empty());
        assert!(graph.variant("b").unwrap().next.is_empty());
        assert_eq!(
            graph.clip_order[&Difficulty::Easy],
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn parents_aggregate_variant_flags() {
        let mut graph = MoveGraph::new();
        let mut medium = track(&[("a1", "wave")]);
        medium = medium
            .try_map(|_, m| Ok(Move { genre: "funk".to_string(), ..m.clone() }))
            .unwrap();
        graph.add_track(Difficulty::Medium, &medium);
        graph.add_track(Difficulty::Expert, &track(&[("a2", "wave")]));
        graph.mark_beginner(&["wave".to_string()]);

        let parent = &graph.parents["wave"];
        assert_eq!(parent.variants, set(&["a1", "a2"]));
        assert_eq!(parent.genres, set(&["funk", "pop"]));
        assert_eq!(parent.eras, set(&["00s"]));
        assert!(parent.beginner);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let easy = track(&[("a", "wave"), ("b", "clap"), ("a", "wave")]);
        let first = MoveGraph::build([(Difficulty::Easy, &easy)], &[]);
        let second = MoveGraph::build([(Difficulty::Easy, &easy)], &[]);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
