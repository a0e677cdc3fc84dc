//! Build orchestration.
//!
//! [`compile`] runs every compiler stage over one request and returns the
//! derived structures; [`package`] writes them into the asset template and
//! [`commit`] puts the bundle and the MIDI file on disk. Nothing is written
//! before every stage has succeeded.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    anim::{emit_anim, AnimEvents},
    assets::{AssetStore, REQUIRED_CONTAINERS},
    battle::{compile_battle, BattleStep},
    graph::MoveGraph,
    library::{FsMoveLibrary, ImportSession, Move, MoveLibrary},
    midi::{compile_timing, TempoChange, TimingFile},
    partyjump::{compile_party_jumps, PartyJumpInterval},
    practice::{compile_practice, PracticePlan},
    sequence::{compile_sequences, FrameSequence},
    timeline::{densify_cameras, densify_expressions, densify_moves, Track},
    BuildConfig, BuildRequest, CompressionMode, Difficulty, PhraseRepeat, Result, SongMetadata,
};

pub const BUNDLE_DIR: &str = "bundle";

/// Bundle-level description of the song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongManifest {
    pub song: SongMetadata,
    pub compression: CompressionMode,
    pub total_measures: u32,
    pub difficulties: Vec<Difficulty>,
    pub phrase_repeats: Vec<PhraseRepeat>,
}

/// Per-build working state shared between stages.
#[derive(Debug, Default)]
pub struct BuildContext {
    pub moves: BTreeMap<Difficulty, Track<Move>>,
    pub cameras: BTreeMap<Difficulty, Track<String>>,
    pub expressions: Track<String>,
}

/// Everything derived from one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSong {
    pub graph: MoveGraph,
    pub battle: Vec<BattleStep>,
    pub party_jumps: Vec<PartyJumpInterval>,
    pub practice: BTreeMap<Difficulty, PracticePlan>,
    pub sequences: BTreeMap<Difficulty, Vec<FrameSequence>>,
    pub anims: BTreeMap<Difficulty, AnimEvents>,
    pub timing: TimingFile,
    pub manifest: SongManifest,
}

/// Packaged bundle plus the encoded timing file.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub bundle: AssetStore,
    pub midi: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub bundle_dir: PathBuf,
    pub midi_path: PathBuf,
    pub entries: usize,
}

fn densify_tracks(
    request: &BuildRequest,
    session: &mut ImportSession<'_>,
) -> Result<BuildContext> {
    let mut context = BuildContext::default();
    for (&difficulty, events) in &request.moves {
        let sparse = densify_moves(difficulty, events)?;
        let resolved = session.resolve_track(&sparse)?;
        tracing::debug!(%difficulty, measures = resolved.len(), "densified choreography");
        context.moves.insert(difficulty, resolved);
    }
    for (&difficulty, events) in &request.cameras {
        context
            .cameras
            .insert(difficulty, densify_cameras(difficulty, events)?);
    }
    context.expressions = densify_expressions(&request.visemes)?;
    Ok(context)
}

fn tempo_map(request: &BuildRequest) -> Vec<TempoChange> {
    if request.tempo.is_empty() && request.song.bpm > 0.0 {
        vec![TempoChange {
            measure: 0,
            bpm: request.song.bpm,
        }]
    } else {
        request.tempo.clone()
    }
}

/// Runs every compiler stage. The first error aborts the build.
#[tracing::instrument(skip_all, fields(song = %request.song.name))]
pub fn compile(
    request: &BuildRequest,
    config: &BuildConfig,
    library: &dyn MoveLibrary,
) -> Result<CompiledSong> {
    let beats_per_measure = config.timing.beats_per_measure;
    let mut session = ImportSession::new(library);

    let context = densify_tracks(request, &mut session)?;

    let graph = MoveGraph::build(
        context.moves.iter().map(|(difficulty, track)| (*difficulty, track)),
        &request.beginner_moves,
    );

    let battle = compile_battle(&request.battle, request.total_measures)?;
    let party_jumps = compile_party_jumps(&request.party_jumps, request.total_measures)?;

    let mut practice = BTreeMap::new();
    let mut sequences = BTreeMap::new();
    for (&difficulty, sections) in &request.practice {
        let plan = compile_practice(difficulty, sections)?;
        sequences.insert(
            difficulty,
            compile_sequences(&plan, &mut session, beats_per_measure)?,
        );
        practice.insert(difficulty, plan);
    }

    let mut difficulties: Vec<Difficulty> = context
        .moves
        .keys()
        .chain(context.cameras.keys())
        .copied()
        .collect();
    difficulties.sort();
    difficulties.dedup();

    let anims = difficulties
        .iter()
        .map(|&difficulty| {
            let events = emit_anim(
                context.moves.get(&difficulty),
                context.cameras.get(&difficulty),
                &context.expressions,
            );
            (difficulty, events)
        })
        .collect();

    let timing = compile_timing(
        &tempo_map(request),
        &request.song_events,
        &request.drums,
        beats_per_measure,
    )?;

    tracing::info!(
        difficulties = difficulties.len(),
        battle_steps = battle.len(),
        imported_moves = session.imported_moves(),
        "compiled song"
    );

    Ok(CompiledSong {
        graph,
        battle,
        party_jumps,
        practice,
        sequences,
        anims,
        timing,
        manifest: SongManifest {
            song: request.song.clone(),
            compression: request.compression,
            total_measures: request.total_measures,
            difficulties,
            phrase_repeats: request.phrase_repeats.clone(),
        },
    })
}

/// Writes the compiled structures into the template's containers.
pub fn package(compiled: &CompiledSong, mut template: AssetStore) -> Result<BuildOutput> {
    template.require_containers(REQUIRED_CONTAINERS)?;

    template.write_json("moves/graph.json", &compiled.graph)?;
    template.write_json("battle/steps.json", &compiled.battle)?;
    template.write_json("partyjump/intervals.json", &compiled.party_jumps)?;
    for (difficulty, plan) in &compiled.practice {
        template.write_json(&format!("practice/{difficulty}.json"), plan)?;
    }
    for (difficulty, sequences) in &compiled.sequences {
        for (index, sequence) in sequences.iter().enumerate() {
            template.write_json(
                &format!("sequences/{difficulty}/{index:03}_{}.json", sequence.name),
                sequence,
            )?;
        }
    }
    for (difficulty, events) in &compiled.anims {
        template.write_json(&format!("anims/{difficulty}.json"), events)?;
    }
    template.write_json("song/manifest.json", &compiled.manifest)?;

    Ok(BuildOutput {
        bundle: template,
        midi: compiled.timing.to_smf_bytes()?,
    })
}

fn midi_file_name(song: &SongMetadata) -> String {
    if song.name.is_empty() {
        "song.mid".to_string()
    } else {
        format!("{}.mid", song.name)
    }
}

/// Puts a packaged build on disk below `output_path`.
pub fn commit(output: &BuildOutput, song: &SongMetadata, output_path: &Path) -> Result<BuildReport> {
    let bundle_dir = output_path.join(BUNDLE_DIR);
    output.bundle.save_dir(&bundle_dir)?;
    let midi_path = output_path.join(midi_file_name(song));
    std::fs::write(&midi_path, &output.midi)?;

    tracing::info!(
        bundle = %bundle_dir.display(),
        midi = %midi_path.display(),
        entries = output.bundle.len(),
        "committed build"
    );
    Ok(BuildReport {
        bundle_dir,
        midi_path,
        entries: output.bundle.len(),
    })
}

pub fn load_template(config: &BuildConfig) -> Result<AssetStore> {
    match &config.paths.template_dir {
        Some(dir) => AssetStore::load_dir(dir),
        None => Ok(AssetStore::with_containers(REQUIRED_CONTAINERS.iter().copied())),
    }
}

/// Full build against the filesystem library named by the request.
pub fn run_build(request: &BuildRequest, config: &BuildConfig) -> Result<BuildReport> {
    let template = load_template(config)?;
    let library = FsMoveLibrary::new(&request.library_root);
    let compiled = compile(request, config, &library)?;
    let output = package(&compiled, template)?;
    commit(&output, &request.song, &request.output_path)
}
