use crate::note::NoteEvent;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default tempo when a file carries no tempo meta event (120 BPM).
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// A tempo change, anchored at the wall-clock time it takes effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TempoSegment {
    tick: u64,
    seconds: f64,
    microseconds_per_beat: u32,
}

/// Maps absolute ticks to seconds through the file's tempo changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoMap {
    ppq: u16,
    /// Fixed tick length for SMPTE-timed files
    timecode_tick_seconds: Option<f64>,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build from the header timing and the tempo meta events of every track.
    pub fn from_smf(smf: &Smf) -> Self {
        let (ppq, timecode_tick_seconds) = match smf.header.timing {
            Timing::Metrical(ticks) => (ticks.as_int(), None),
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
                (480, Some(1.0 / ticks_per_second.max(1.0)))
            }
        };

        let mut changes: Vec<(u64, u32)> = Vec::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    changes.push((tick, tempo.as_int()));
                }
            }
        }
        changes.sort_by_key(|(tick, _)| *tick);
        changes.dedup_by(|a, b| a.0 == b.0);

        Self::from_changes(ppq, timecode_tick_seconds, &changes)
    }

    /// A single-tempo map, handy for writing and for tests.
    pub fn constant(ppq: u16, bpm: f64) -> Self {
        let usec = (60_000_000.0 / bpm).round() as u32;
        Self::from_changes(ppq, None, &[(0, usec)])
    }

    fn from_changes(ppq: u16, timecode_tick_seconds: Option<f64>, changes: &[(u64, u32)]) -> Self {
        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            microseconds_per_beat: DEFAULT_USEC_PER_BEAT,
        }];

        for &(tick, usec) in changes {
            let seconds = Self::seconds_in(&segments, ppq, tick);
            if tick == 0 {
                segments[0].microseconds_per_beat = usec;
            } else {
                segments.push(TempoSegment {
                    tick,
                    seconds,
                    microseconds_per_beat: usec,
                });
            }
        }

        Self {
            ppq,
            timecode_tick_seconds,
            segments,
        }
    }

    fn seconds_in(segments: &[TempoSegment], ppq: u16, tick: u64) -> f64 {
        let segment = segments
            .iter()
            .rev()
            .find(|s| s.tick <= tick)
            .unwrap_or(&segments[0]);
        let beats = (tick - segment.tick) as f64 / ppq.max(1) as f64;
        segment.seconds + beats * segment.microseconds_per_beat as f64 / 1_000_000.0
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        match self.timecode_tick_seconds {
            Some(tick_seconds) => tick as f64 * tick_seconds,
            None => Self::seconds_in(&self.segments, self.ppq, tick),
        }
    }

    /// Inverse of [`tick_to_seconds`](Self::tick_to_seconds), rounded to the nearest tick.
    pub fn seconds_to_tick(&self, seconds: f64) -> u64 {
        if let Some(tick_seconds) = self.timecode_tick_seconds {
            return (seconds / tick_seconds).round().max(0.0) as u64;
        }
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.seconds <= seconds)
            .unwrap_or(&self.segments[0]);
        let beats =
            (seconds - segment.seconds) * 1_000_000.0 / segment.microseconds_per_beat as f64;
        segment.tick + (beats * self.ppq as f64).round().max(0.0) as u64
    }

    pub fn initial_bpm(&self) -> f64 {
        60_000_000.0 / self.segments[0].microseconds_per_beat as f64
    }
}

/// Extract sounding notes from every track, pairing note-on/note-off events.
///
/// Returns one note list per track (in track order), each sorted by onset then
/// pitch. Zero-velocity note-ons close notes and never produce notes of their own.
pub fn extract_tracks(smf: &Smf) -> Vec<Vec<NoteEvent>> {
    let tempo = TempoMap::from_smf(smf);

    smf.tracks
        .iter()
        .map(|track| {
            let mut notes = Vec::new();
            let mut current_tick: u64 = 0;
            // (channel, pitch) → stack of (onset_tick, velocity)
            let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

            for event in track {
                current_tick += event.delta.as_int() as u64;

                if let TrackEventKind::Midi { channel, message } = event.kind {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                                if let Some((onset, velocity)) = stack.pop() {
                                    notes.push(NoteEvent::new(
                                        tempo.tick_to_seconds(onset),
                                        tempo.tick_to_seconds(current_tick),
                                        key.as_int(),
                                        velocity,
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            // Close anything still sounding at the end of the track
            for ((_, pitch), stack) in pending {
                for (onset, velocity) in stack {
                    notes.push(NoteEvent::new(
                        tempo.tick_to_seconds(onset),
                        tempo.tick_to_seconds(current_tick),
                        pitch,
                        velocity,
                    ));
                }
            }

            notes.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(a.pitch.cmp(&b.pitch)));
            notes
        })
        .collect()
}

/// Parse MIDI bytes and return the melody: the first track that carries notes.
///
/// Transcription output and corpus melody files both put the melody on their
/// first instrument track; tempo-only conductor tracks are skipped.
pub fn melody_from_midi(midi_bytes: &[u8]) -> crate::Result<Vec<NoteEvent>> {
    let smf = Smf::parse(midi_bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;

    let melody = extract_tracks(&smf)
        .into_iter()
        .find(|notes| !notes.is_empty())
        .unwrap_or_default();

    tracing::debug!(notes = melody.len(), "extracted melody track");
    Ok(melody)
}
