//! Tick-accurate music timing file.
//!
//! Three parallel tracks at [`TICKS_PER_BEAT`] resolution: tempo changes,
//! song milestone markers and drum notes. Each track is built as absolute
//! ticks first and then delta-encoded; [`TimingFile::to_smf_bytes`] writes a
//! format-1 standard MIDI file.

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Location, Stage},
    BuildError, Result,
};

pub const TICKS_PER_BEAT: u32 = 480;
/// Drum note length: half a beat.
pub const DRUM_GATE_TICKS: u32 = TICKS_PER_BEAT / 2;
/// Note used for drum sounds missing from [`DRUM_NOTES`].
pub const DEFAULT_DRUM_NOTE: u8 = 60;
pub const DRUM_VELOCITY: u8 = 100;

const MAX_DELTA: u32 = (1 << 28) - 1;
const DRUM_CHANNEL: u8 = 9;

/// Drum sound id -> MIDI note.
pub const DRUM_NOTES: &[(&str, u8)] = &[
    ("kick", 36),
    ("snare", 38),
    ("clap", 39),
    ("hihat", 42),
    ("tom_low", 45),
    ("open_hihat", 46),
    ("tom_mid", 47),
    ("crash", 49),
    ("tom_high", 50),
    ("ride", 51),
];

pub fn drum_note(sound_id: &str) -> u8 {
    DRUM_NOTES
        .iter()
        .find(|(name, _)| *name == sound_id)
        .map(|(_, note)| *note)
        .unwrap_or(DEFAULT_DRUM_NOTE)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    /// 0-based measure the tempo takes effect at.
    pub measure: u32,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SongEventKind {
    MusicStart,
    Preview,
    FreestyleStart,
    FreestyleEnd,
    MusicEnd,
    End,
}

wire_enum!(SongEventKind, "song event type" {
    MusicStart => "music_start",
    Preview => "preview",
    FreestyleStart => "freestyle_start",
    FreestyleEnd => "freestyle_end",
    MusicEnd => "music_end",
    End => "end",
});

impl SongEventKind {
    /// Marker text written to the events track.
    pub fn token(self) -> &'static str {
        match self {
            SongEventKind::MusicStart => "[music_start]",
            SongEventKind::Preview => "[preview]",
            SongEventKind::FreestyleStart => "[freestyle_start]",
            SongEventKind::FreestyleEnd => "[freestyle_end]",
            SongEventKind::MusicEnd => "[music_end]",
            SongEventKind::End => "[end]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SongEvent {
    pub beat: f64,
    #[serde(rename = "type")]
    pub kind: SongEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumTrack {
    pub sound_id: String,
    /// Hit positions on the half-beat grid.
    pub hits: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimedKind {
    TimeSignature { numerator: u8, denominator_pow2: u8 },
    Tempo { micros_per_beat: u32 },
    Marker(&'static str),
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u32,
    pub delta: u32,
    pub kind: TimedKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedTrack {
    pub name: &'static str,
    pub events: Vec<TimedEvent>,
}

impl TimedTrack {
    /// Builds a track from events already in emission order.
    fn from_ticks(name: &'static str, ticks: Vec<(u32, TimedKind)>) -> Result<Self> {
        let mut events = Vec::with_capacity(ticks.len());
        let mut previous = 0;
        for (tick, kind) in ticks {
            let delta = tick.checked_sub(previous).ok_or_else(|| {
                BuildError::validation(Stage::Timing, format!("{name} track goes back in time at tick {tick}"))
            })?;
            if delta > MAX_DELTA {
                return Err(BuildError::validation(
                    Stage::Timing,
                    format!("{name} track delta {delta} exceeds the MIDI limit"),
                ));
            }
            events.push(TimedEvent { tick, delta, kind });
            previous = tick;
        }
        Ok(Self { name, events })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingFile {
    pub tempo: TimedTrack,
    pub markers: TimedTrack,
    pub drums: TimedTrack,
}

fn tempo_track(changes: &[TempoChange], beats_per_measure: u32) -> Result<TimedTrack> {
    let mut sorted = changes.to_vec();
    sorted.sort_by_key(|change| change.measure);

    let mut ticks = vec![(
        0,
        TimedKind::TimeSignature {
            numerator: beats_per_measure.min(u32::from(u8::MAX)) as u8,
            denominator_pow2: 2,
        },
    )];
    for change in sorted {
        if !(change.bpm.is_finite() && change.bpm > 0.0) {
            return Err(BuildError::at_measure(
                Stage::Timing,
                change.measure,
                format!("invalid tempo {} bpm", change.bpm),
            ));
        }
        let micros_per_beat = (60_000_000.0 / change.bpm).round() as u32;
        if micros_per_beat > 0x00FF_FFFF {
            return Err(BuildError::at_measure(
                Stage::Timing,
                change.measure,
                format!("tempo {} bpm is too slow to encode", change.bpm),
            ));
        }
        let tick = change
            .measure
            .checked_mul(beats_per_measure)
            .and_then(|beat| beat.checked_mul(TICKS_PER_BEAT))
            .ok_or_else(|| {
                BuildError::at_measure(Stage::Timing, change.measure, "tempo change is out of range")
            })?;
        ticks.push((tick, TimedKind::Tempo { micros_per_beat }));
    }

    TimedTrack::from_ticks("TEMPO", ticks)
}

fn marker_track(events: &[SongEvent]) -> Result<TimedTrack> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.beat.total_cmp(&b.beat));

    let mut ticks = Vec::with_capacity(sorted.len());
    for event in sorted {
        if !(event.beat.is_finite() && event.beat >= 0.0) {
            return Err(BuildError::validation(
                Stage::Timing,
                format!("{} event at invalid beat {}", event.kind, event.beat),
            ));
        }
        let tick = (event.beat * f64::from(TICKS_PER_BEAT)).round();
        if tick > f64::from(u32::MAX) {
            return Err(BuildError::validation(
                Stage::Timing,
                format!("{} event at beat {} is out of range", event.kind, event.beat),
            ));
        }
        let tick = tick as u32;
        ticks.push((tick, TimedKind::Marker(event.kind.token())));
    }

    TimedTrack::from_ticks("EVENTS", ticks)
}

fn drum_track(drums: &[DrumTrack]) -> Result<TimedTrack> {
    // (tick, off-after-on rank, event)
    let mut notes = Vec::new();
    for drum in drums {
        let key = drum_note(&drum.sound_id);
        for &hit in &drum.hits {
            let on = (hit / 2)
                .checked_mul(TICKS_PER_BEAT)
                .ok_or_else(|| {
                    BuildError::at(
                        Stage::Timing,
                        Location::Index(hit),
                        format!("{} hit is out of range", drum.sound_id),
                    )
                })?;
            notes.push((
                on,
                0u8,
                TimedKind::NoteOn {
                    key,
                    velocity: DRUM_VELOCITY,
                },
            ));
            notes.push((on.saturating_add(DRUM_GATE_TICKS), 1u8, TimedKind::NoteOff { key }));
        }
    }

    notes.sort_by_key(|(tick, rank, _)| (*tick, *rank));
    let ticks = notes
        .into_iter()
        .map(|(tick, _, kind)| (tick, kind))
        .collect();
    TimedTrack::from_ticks("DRUMS", ticks)
}

/// Compiles the tempo map, milestones and drum grid.
#[tracing::instrument(skip_all, fields(tempo = tempo.len(), markers = song_events.len(), drums = drums.len()))]
pub fn compile_timing(
    tempo: &[TempoChange],
    song_events: &[SongEvent],
    drums: &[DrumTrack],
    beats_per_measure: u32,
) -> Result<TimingFile> {
    Ok(TimingFile {
        tempo: tempo_track(tempo, beats_per_measure)?,
        markers: marker_track(song_events)?,
        drums: drum_track(drums)?,
    })
}

fn smf_event(delta: u32, kind: &TimedKind) -> TrackEvent<'static> {
    let kind = match kind {
        TimedKind::TimeSignature {
            numerator,
            denominator_pow2,
        } => TrackEventKind::Meta(MetaMessage::TimeSignature(*numerator, *denominator_pow2, 24, 8)),
        TimedKind::Tempo { micros_per_beat } => {
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(*micros_per_beat)))
        }
        TimedKind::Marker(token) => TrackEventKind::Meta(MetaMessage::Text(token.as_bytes())),
        TimedKind::NoteOn { key, velocity } => TrackEventKind::Midi {
            channel: u4::new(DRUM_CHANNEL),
            message: MidiMessage::NoteOn {
                key: u7::new(*key),
                vel: u7::new(*velocity),
            },
        },
        TimedKind::NoteOff { key } => TrackEventKind::Midi {
            channel: u4::new(DRUM_CHANNEL),
            message: MidiMessage::NoteOff {
                key: u7::new(*key),
                vel: u7::new(0),
            },
        },
    };
    TrackEvent {
        delta: u28::new(delta),
        kind,
    }
}

impl TimingFile {
    pub fn tracks(&self) -> [&TimedTrack; 3] {
        [&self.tempo, &self.markers, &self.drums]
    }

    /// Encodes the file as a format-1 standard MIDI file.
    pub fn to_smf_bytes(&self) -> Result<Vec<u8>> {
        let header = Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TICKS_PER_BEAT as u16)),
        );
        let mut smf = Smf::new(header);
        for track in self.tracks() {
            let mut events = Vec::with_capacity(track.events.len() + 2);
            events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
            });
            events.extend(
                track
                    .events
                    .iter()
                    .map(|event| smf_event(event.delta, &event.kind)),
            );
            events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            smf.tracks.push(events);
        }

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(track: &TimedTrack) -> Vec<u32> {
        track.events.iter().map(|event| event.delta).collect()
    }

    #[test]
    fn tempo_ticks_follow_measures() {
        let changes = [
            TempoChange { measure: 4, bpm: 100.0 },
            TempoChange { measure: 0, bpm: 120.0 },
        ];
        let track = tempo_track(&changes, 4).unwrap();

        assert_eq!(track.events[1].tick, 0);
        assert_eq!(
            track.events[1].kind,
            TimedKind::Tempo {
                micros_per_beat: 500_000
            }
        );
        assert_eq!(track.events[2].tick, 4 * 4 * 480);
        assert_eq!(deltas(&track), vec![0, 0, 7680]);
    }

    #[test]
    fn markers_are_delta_encoded() {
        let events = [
            SongEvent { beat: 8.0, kind: SongEventKind::Preview },
            SongEvent { beat: 1.0, kind: SongEventKind::MusicStart },
            SongEvent { beat: 64.5, kind: SongEventKind::End },
        ];
        let track = marker_track(&events).unwrap();

        let tokens: Vec<&TimedKind> = track.events.iter().map(|e| &e.kind).collect();
        assert_eq!(
            tokens,
            vec![
                &TimedKind::Marker("[music_start]"),
                &TimedKind::Marker("[preview]"),
                &TimedKind::Marker("[end]"),
            ]
        );
        assert_eq!(deltas(&track), vec![480, 3360, 27120]);
    }

    #[test]
    fn drum_hit_gates_for_half_a_beat() {
        let track = drum_track(&[DrumTrack {
            sound_id: "snare".to_string(),
            hits: vec![5],
        }])
        .unwrap();

        assert_eq!(track.events[0].tick, 2 * 480);
        assert_eq!(track.events[0].kind, TimedKind::NoteOn { key: 38, velocity: 100 });
        assert_eq!(track.events[1].tick, 2 * 480 + 240);
        assert_eq!(track.events[1].kind, TimedKind::NoteOff { key: 38 });
    }

    #[test]
    fn note_on_precedes_note_off_at_equal_ticks() {
        let drums = [
            DrumTrack {
                sound_id: "kick".to_string(),
                hits: vec![0],
            },
            DrumTrack {
                sound_id: "mystery".to_string(),
                hits: vec![1],
            },
        ];
        let track = drum_track(&drums).unwrap();
        let kinds: Vec<&TimedKind> = track.events.iter().map(|e| &e.kind).collect();

        // both hits land on tick 0 and both offs on tick 240
        assert_eq!(
            kinds,
            vec![
                &TimedKind::NoteOn { key: 36, velocity: 100 },
                &TimedKind::NoteOn { key: DEFAULT_DRUM_NOTE, velocity: 100 },
                &TimedKind::NoteOff { key: 36 },
                &TimedKind::NoteOff { key: DEFAULT_DRUM_NOTE },
            ]
        );
        assert_eq!(deltas(&track), vec![0, 0, 240, 0]);
    }

    #[test]
    fn unknown_sounds_use_default_note() {
        assert_eq!(drum_note("kick"), 36);
        assert_eq!(drum_note("cowbell_xl"), DEFAULT_DRUM_NOTE);
    }

    #[test]
    fn rejects_invalid_tempo() {
        let err = tempo_track(&[TempoChange { measure: 2, bpm: 0.0 }], 4).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Timing));
    }

    #[test]
    fn far_tempo_change_is_rejected() {
        let err = compile_timing(
            &[TempoChange {
                measure: 3_000_000,
                bpm: 120.0,
            }],
            &[],
            &[],
            4,
        )
        .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Timing));
        assert!(err.to_string().contains("measure 3000000"));
    }

    #[test]
    fn far_marker_is_rejected() {
        let err = marker_track(&[SongEvent { beat: 1e12, kind: SongEventKind::End }]).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Timing));
    }

    #[test]
    fn writes_three_track_smf() {
        let file = compile_timing(
            &[TempoChange { measure: 0, bpm: 120.0 }],
            &[SongEvent { beat: 0.0, kind: SongEventKind::MusicStart }],
            &[DrumTrack {
                sound_id: "kick".to_string(),
                hits: vec![0, 2],
            }],
            4,
        )
        .unwrap();
        let bytes = file.to_smf_bytes().unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));
        assert_eq!(smf.tracks.len(), 3);
        // name + 4 note events + end of track
        assert_eq!(smf.tracks[2].len(), 6);
    }
}
