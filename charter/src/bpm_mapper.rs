//! Chart generation from tempo and song structure alone.
//!
//! Used when there is no audio to analyze or analysis failed. Notes are
//! placed on the beat grid with section-dependent density, lanes and kinds.
//! A nonzero seed makes the output reproducible.

use crate::analysis::AnalysisResult;
use crate::hold_detector::HoldDetector;
use crate::lane_assigner::{random_edge_lane, random_key_lane, random_lane, seeded_rng};
use crate::note::{is_edge_lane, nearest_edge_lane, NoteEvent, NoteKind};
use crate::sections::SectionKind;
use crate::smart_mapper::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::tempo::DEFAULT_BPM;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MAX_BPM: f32 = 300.0;

const ACCENT_CHANCE: f32 = 0.3;

/// Section of a song as seen by the fallback generator
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongSection {
    pub kind: SectionKind,
    pub start: f32,
    pub end: f32,
    /// Chance of a note on each beat; values above 1 always place one
    pub density: f32,
}

impl SongSection {
    pub fn new(kind: SectionKind, start: f32, end: f32, density: f32) -> Self {
        SongSection {
            kind,
            start,
            end,
            density,
        }
    }

    /// Sections detected by analysis, weighted with the smart generator's densities
    pub fn from_analysis(analysis: &AnalysisResult) -> Vec<SongSection> {
        analysis
            .sections
            .iter()
            .map(|s| SongSection::new(s.kind, s.start, s.end, s.kind.density_multiplier()))
            .collect()
    }

    fn contains(&self, time: f32) -> bool {
        time >= self.start && time < self.end
    }
}

/// Intro, build, drop and outro over an eighth, a quarter, three eighths
/// and the final quarter of the song
pub fn default_sections(duration: f32) -> Vec<SongSection> {
    vec![
        SongSection::new(SectionKind::Intro, 0.0, duration * 0.125, 0.3),
        SongSection::new(SectionKind::Build, duration * 0.125, duration * 0.375, 0.5),
        SongSection::new(SectionKind::Drop, duration * 0.375, duration * 0.75, 1.0),
        SongSection::new(SectionKind::Outro, duration * 0.75, duration, 0.4),
    ]
}

fn section_for(sections: &[SongSection], time: f32) -> SongSection {
    sections
        .iter()
        .find(|s| s.contains(time))
        .or_else(|| sections.last())
        .copied()
        .unwrap_or(SongSection::new(SectionKind::Calm, 0.0, f32::INFINITY, 0.5))
}

/// Out-of-range tempos are replaced by the default rather than rejected
pub fn sanitize_bpm(bpm: f32) -> f32 {
    if bpm > 0.0 && bpm <= MAX_BPM {
        bpm
    } else {
        log::warn!("BPM {} out of range, using {}", bpm, DEFAULT_BPM);
        DEFAULT_BPM
    }
}

/// What is known about a song without its audio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongInfo {
    pub bpm: f32,
    pub duration: f32,
    pub difficulty: u8,
    #[serde(default)]
    pub sections: Vec<SongSection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmMapperConfig {
    pub min_note_gap: f32, // seconds between notes in song-level charts
}

impl Default for BpmMapperConfig {
    fn default() -> Self {
        BpmMapperConfig { min_note_gap: 0.1 }
    }
}

#[derive(Default)]
pub struct BpmBeatMapper {
    config: BpmMapperConfig,
    holds: HoldDetector,
}

impl BpmBeatMapper {
    pub fn new(config: BpmMapperConfig) -> Self {
        BpmBeatMapper {
            config,
            holds: HoldDetector::default(),
        }
    }

    /// One step per beat; each section's density is the chance of a note.
    /// Drops may add a second simultaneous tap as an accent.
    pub fn generate_from_bpm(
        &self,
        bpm: f32,
        duration: f32,
        sections: &[SongSection],
        seed: u64,
    ) -> Vec<NoteEvent> {
        if !(duration > 0.0 && duration.is_finite()) {
            log::warn!("Cannot chart a song of duration {}", duration);
            return Vec::new();
        }

        let beat = 60.0 / sanitize_bpm(bpm);
        let mut rng = seeded_rng(seed);
        let mut notes: Vec<NoteEvent> = Vec::new();

        let mut step = 0u32;
        loop {
            let time = step as f32 * beat;
            if time >= duration {
                break;
            }
            step += 1;

            let section = section_for(sections, time);
            if rng.gen::<f32>() < section.density {
                notes.push(beat_note(time, beat, section.kind, &mut rng));
            }

            if section.kind == SectionKind::Drop && rng.gen::<f32>() < ACCENT_CHANCE {
                if let Some(last) = notes.last() {
                    let lane = random_lane(&mut rng);
                    if lane != last.lane {
                        notes.push(NoteEvent::tap(time, lane));
                    }
                }
            }
        }

        let notes = self.holds.resolve(notes, duration);
        log::info!(
            "Generated {} notes from {:.1} BPM over {:.1}s",
            notes.len(),
            60.0 / beat,
            duration
        );
        notes
    }

    /// Difficulty-scaled variant: the spawn chance is the section density
    /// times `difficulty / 10`, and notes keep a minimum gap.
    pub fn generate_for_song(&self, song: &SongInfo, seed: u64) -> Vec<NoteEvent> {
        if !(song.duration > 0.0 && song.duration.is_finite()) {
            log::warn!("Cannot chart a song of duration {}", song.duration);
            return Vec::new();
        }

        let beat = 60.0 / sanitize_bpm(song.bpm);
        let difficulty = song.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let scale = difficulty as f32 / MAX_DIFFICULTY as f32;
        let mut rng = seeded_rng(seed);
        let mut notes = Vec::new();
        let mut last_time = f32::NEG_INFINITY;

        let mut step = 0u32;
        loop {
            let time = step as f32 * beat;
            if time >= song.duration {
                break;
            }
            step += 1;

            let section = section_for(&song.sections, time);
            if rng.gen::<f32>() < section.density * scale
                && time - last_time >= self.config.min_note_gap
            {
                notes.push(song_note(time, section.kind, &mut rng));
                last_time = time;
            }
        }

        let notes = self.holds.resolve(notes, song.duration);
        log::info!(
            "Generated {} notes for a {:.1}s song at difficulty {}",
            notes.len(),
            song.duration,
            difficulty
        );
        notes
    }
}

fn beat_note<R: Rng>(time: f32, beat: f32, section: SectionKind, rng: &mut R) -> NoteEvent {
    let lane = match section {
        SectionKind::Drop => random_lane(rng),
        _ => random_key_lane(rng),
    };

    let kind = match section {
        SectionKind::Build if rng.gen::<f32>() < 0.15 => NoteKind::Long,
        SectionKind::Drop => match rng.gen::<f32>() {
            r if r < 0.1 => NoteKind::Scratch,
            r if r < 0.25 => NoteKind::Long,
            _ => NoteKind::Tap,
        },
        _ => NoteKind::Tap,
    };

    match kind {
        NoteKind::Long => {
            let beats = 1 + rng.gen_range(0..3);
            NoteEvent::long(time, lane, beat * beats as f32)
        }
        NoteKind::Scratch if !is_edge_lane(lane) => {
            NoteEvent::scratch(time, nearest_edge_lane(lane))
        }
        NoteKind::Scratch => NoteEvent::scratch(time, lane),
        NoteKind::Tap => NoteEvent::tap(time, lane),
    }
}

fn song_note<R: Rng>(time: f32, section: SectionKind, rng: &mut R) -> NoteEvent {
    match section {
        SectionKind::Build => {
            let lane = random_key_lane(rng);
            if rng.gen::<f32>() < 0.2 {
                NoteEvent::long(time, lane, rng.gen_range(0.5..1.5))
            } else {
                NoteEvent::tap(time, lane)
            }
        }
        SectionKind::Drop => {
            if rng.gen::<f32>() < 0.15 {
                return NoteEvent::scratch(time, random_edge_lane(rng));
            }
            let lane = random_key_lane(rng);
            if rng.gen::<f32>() < 0.25 {
                NoteEvent::long(time, lane, rng.gen_range(0.3..1.0))
            } else {
                NoteEvent::tap(time, lane)
            }
        }
        _ => NoteEvent::tap(time, random_key_lane(rng)),
    }
}
