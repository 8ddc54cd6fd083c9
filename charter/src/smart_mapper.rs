//! Analysis-driven chart generation.
//!
//! Onsets are filtered by difficulty and section density, mapped to lanes
//! from their dominant frequency band, classified as tap, long or scratch,
//! and optionally doubled into chords on harder difficulties.

use crate::analysis::AnalysisResult;
use crate::hold_detector::HoldDetector;
use crate::lane_assigner::{random_key_lane, seeded_rng, LaneAssigner};
use crate::note::{
    is_edge_lane, NoteEvent, NoteKind, KEY_LANES, LEFT_EDGE_LANE, RIGHT_EDGE_LANE,
};
use crate::onset::OnsetEvent;
use crate::sections::{section_at, SectionKind};
use crate::tempo::DEFAULT_BPM;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

/// Difficulty from which chords appear
const CHORD_DIFFICULTY: u8 = 6;
const MIN_LONG_DURATION: f32 = 0.3;
const MAX_LONG_DURATION: f32 = 2.0;
const LONG_GAP_RATIO: f32 = 0.8;

// Beat-grid chart for analyses without onsets
const EMPTY_CHART_LEAD_IN: f32 = 2.0;
const EMPTY_CHART_TAIL: f32 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub difficulty: u8,              // 1-10, clamped
    pub min_note_interval: f32,      // seconds at the middle difficulty
    pub long_note_threshold: f32,    // normalized strength
    pub scratch_note_threshold: f32, // normalized strength
    pub long_note_duration: f32,     // hold length for the final onset
    pub seed: u64,                   // 0 = entropy
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            difficulty: 5,
            min_note_interval: 0.15,
            long_note_threshold: 0.7,
            scratch_note_threshold: 0.8,
            long_note_duration: 0.5,
            seed: 0,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Position of `difficulty` within 1..=10 as a value in [0, 1]
fn difficulty_ratio(difficulty: u8) -> f32 {
    (difficulty - MIN_DIFFICULTY) as f32 / (MAX_DIFFICULTY - MIN_DIFFICULTY) as f32
}

pub struct SmartBeatMapper {
    config: MapperConfig,
    holds: HoldDetector,
}

impl SmartBeatMapper {
    pub fn new(config: MapperConfig) -> Self {
        SmartBeatMapper {
            config,
            holds: HoldDetector::default(),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u8 {
        self.config.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    /// Minimum normalized strength a note must have: 0.5 at difficulty 1
    /// down to 0.05 at difficulty 10
    pub fn strength_threshold(&self) -> f32 {
        lerp(0.5, 0.05, difficulty_ratio(self.difficulty()))
    }

    /// Minimum spacing between notes, tighter on harder difficulties
    pub fn min_interval(&self) -> f32 {
        self.config.min_note_interval / lerp(0.5, 1.5, difficulty_ratio(self.difficulty()))
    }

    fn chord_chance(&self) -> f32 {
        let t = (self.difficulty() - CHORD_DIFFICULTY) as f32
            / (MAX_DIFFICULTY - CHORD_DIFFICULTY) as f32;
        lerp(0.05, 0.3, t)
    }

    pub fn generate(&self, analysis: &AnalysisResult) -> Vec<NoteEvent> {
        if !(analysis.duration > 0.0 && analysis.duration.is_finite()) {
            log::warn!("Cannot chart a song of duration {}", analysis.duration);
            return Vec::new();
        }

        let mut rng = seeded_rng(self.config.seed);

        if analysis.onsets.is_empty() {
            log::warn!("Analysis has no onsets, falling back to a beat grid");
            let notes = self.beat_grid(analysis.bpm, analysis.duration, &mut rng);
            return self.holds.resolve(notes, analysis.duration);
        }

        let max_strength = analysis
            .onsets
            .iter()
            .map(|o| o.strength)
            .fold(0.0f32, f32::max);
        let max_strength = if max_strength > 0.0 { max_strength } else { 1.0 };

        let threshold = self.strength_threshold();
        let min_interval = self.min_interval();
        let mut lanes = LaneAssigner::new();
        let mut last_time = f32::NEG_INFINITY;
        let mut notes = Vec::new();

        for (index, onset) in analysis.onsets.iter().enumerate() {
            if !(0.0..=analysis.duration).contains(&onset.time) {
                continue;
            }

            let strength = onset.strength / max_strength;
            if strength < threshold || onset.time - last_time < min_interval {
                continue;
            }

            let section = section_at(&analysis.sections, onset.time)
                .map(|s| s.kind)
                .unwrap_or(SectionKind::Build);
            let density = section.density_multiplier();
            if density < 1.0 && strength < threshold / density {
                continue;
            }

            let lane = lanes.assign(onset.dominant_band, &mut rng);
            let kind = self.note_kind(strength, onset.dominant_band, lane, section);
            let duration = match kind {
                NoteKind::Long => self.long_duration(&analysis.onsets, index),
                _ => 0.0,
            };

            notes.push(NoteEvent {
                hit_time: onset.time,
                lane,
                kind,
                duration,
            });
            last_time = onset.time;
        }

        if self.difficulty() >= CHORD_DIFFICULTY {
            let chords = self.chord_notes(&notes, &mut rng);
            notes.extend(chords);
        }

        let notes = self.holds.resolve(notes, analysis.duration);
        log::info!(
            "Generated {} notes from {} onsets at difficulty {}",
            notes.len(),
            analysis.onsets.len(),
            self.difficulty()
        );
        notes
    }

    fn note_kind(&self, strength: f32, band: u8, lane: u8, section: SectionKind) -> NoteKind {
        let extreme_band = band <= 1 || band >= 6;
        if section == SectionKind::Drop
            && strength > self.config.scratch_note_threshold
            && extreme_band
            && is_edge_lane(lane)
        {
            NoteKind::Scratch
        } else if strength > self.config.long_note_threshold
            && matches!(section, SectionKind::Build | SectionKind::Drop)
        {
            NoteKind::Long
        } else {
            NoteKind::Tap
        }
    }

    /// Hold length for the onset at `index`: most of the gap to the next onset
    fn long_duration(&self, onsets: &[OnsetEvent], index: usize) -> f32 {
        match onsets.get(index + 1) {
            Some(next) => ((next.time - onsets[index].time) * LONG_GAP_RATIO)
                .clamp(MIN_LONG_DURATION, MAX_LONG_DURATION),
            None => self.config.long_note_duration,
        }
    }

    /// Taps on the other key lane alongside existing key-lane notes
    fn chord_notes<R: Rng>(&self, notes: &[NoteEvent], rng: &mut R) -> Vec<NoteEvent> {
        let chance = self.chord_chance();
        let mut chords: Vec<NoteEvent> = Vec::new();

        for note in notes {
            if rng.gen::<f32>() > chance {
                continue;
            }
            if note.kind == NoteKind::Scratch || is_edge_lane(note.lane) {
                continue;
            }

            let (chord_lane, edge_lane) = if note.lane == KEY_LANES[0] {
                (KEY_LANES[1], RIGHT_EDGE_LANE)
            } else {
                (KEY_LANES[0], LEFT_EDGE_LANE)
            };
            let chord = NoteEvent::tap(note.hit_time, chord_lane);
            let edge = NoteEvent::tap(note.hit_time, edge_lane);

            if notes.iter().any(|n| n.collides_with(&edge))
                || notes.iter().chain(&chords).any(|n| n.collides_with(&chord))
                || HoldDetector::is_held(notes, chord_lane, note.hit_time)
            {
                continue;
            }
            chords.push(chord);
        }

        log::debug!("Added {} chord notes", chords.len());
        chords
    }

    /// Taps on the beat from a short lead-in until just before the end
    fn beat_grid<R: Rng>(&self, bpm: f32, duration: f32, rng: &mut R) -> Vec<NoteEvent> {
        let bpm = if bpm > 0.0 && bpm.is_finite() { bpm } else { DEFAULT_BPM };
        let beat = 60.0 / bpm;

        let mut notes = Vec::new();
        let mut step = 0u32;
        loop {
            let time = EMPTY_CHART_LEAD_IN + step as f32 * beat;
            if time >= duration - EMPTY_CHART_TAIL {
                break;
            }
            notes.push(NoteEvent::tap(time, random_key_lane(rng)));
            step += 1;
        }
        notes
    }
}
