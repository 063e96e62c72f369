use crate::midi::TempoMap;
use crate::note::NoteEvent;

const PPQ: u16 = 480;

/// Write a melody to Standard MIDI File format 1 bytes at a constant tempo.
///
/// Track 0: tempo + 4/4 time signature.
/// Track 1: the melody on channel 0. Zero-velocity events are skipped.
pub fn melody_to_midi(notes: &[NoteEvent], bpm: f64) -> Vec<u8> {
    let tempo = TempoMap::constant(PPQ, bpm);
    let tracks = vec![build_tempo_track(bpm), build_melody_track(notes, &tempo)];
    build_midi_file(PPQ, &tracks)
}

fn build_tempo_track(bpm: f64) -> Vec<u8> {
    let usec = (60_000_000.0 / bpm).round() as u32;
    let mut track_data = Vec::new();

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x58, 0x04, 4, 2, 0x18, 0x08]);

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    track_data
}

fn build_melody_track(notes: &[NoteEvent], tempo: &TempoMap) -> Vec<u8> {
    let mut events: Vec<(u64, [u8; 3])> = Vec::new();

    for note in notes.iter().filter(|n| n.is_sounding()) {
        events.push((
            tempo.seconds_to_tick(note.onset),
            [0x90, note.pitch & 0x7F, note.velocity & 0x7F],
        ));
        events.push((tempo.seconds_to_tick(note.offset), [0x80, note.pitch & 0x7F, 0]));
    }

    // Note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1[0] & 0xF0 == 0x80;
            let b_is_off = b.1[0] & 0xF0 == 0x80;
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, data) in events {
        write_vlq(&mut track_data, tick.saturating_sub(last_tick) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    track_data
}

fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a MIDI variable-length quantity.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 4];
    let mut count = 0;

    bytes[count] = (value & 0x7F) as u8;
    count += 1;
    value >>= 7;
    while value > 0 {
        bytes[count] = ((value & 0x7F) | 0x80) as u8;
        count += 1;
        value >>= 7;
    }

    for i in (0..count).rev() {
        buf.push(bytes[i]);
    }
}
