use crate::note::{sort_by_time, NoteEvent, NoteKind, LANE_COUNT};

/// Keeps long notes playable: a hold never runs into the next note on its
/// lane or past the end of the song.
#[derive(Clone, Debug)]
pub struct HoldDetector {
    pub min_hold_duration: f32, // shorter holds are demoted to taps
    pub release_gap: f32,       // seconds between a hold's release and the next note in its lane
}

impl Default for HoldDetector {
    fn default() -> Self {
        HoldDetector {
            min_hold_duration: 0.1,
            release_gap: 0.05,
        }
    }
}

impl HoldDetector {
    /// Whether a hold in `lane` is still down at `time`
    pub fn is_held(notes: &[NoteEvent], lane: u8, time: f32) -> bool {
        notes.iter().any(|n| {
            n.kind == NoteKind::Long && n.lane == lane && n.hit_time < time && time < n.end_time()
        })
    }

    /// Sort `notes`, drop same-lane duplicates and trim every hold so it ends
    /// before the next note in its lane and by `song_end`.
    pub fn resolve(&self, mut notes: Vec<NoteEvent>, song_end: f32) -> Vec<NoteEvent> {
        sort_by_time(&mut notes);

        let before = notes.len();
        let mut kept: Vec<NoteEvent> = Vec::with_capacity(notes.len());
        for note in notes {
            let duplicate = kept
                .iter()
                .rev()
                .take_while(|k| note.hit_time - k.hit_time < f32::EPSILON)
                .any(|k| k.lane == note.lane);
            if !duplicate {
                kept.push(note);
            }
        }
        if kept.len() < before {
            log::debug!("Dropped {} duplicate notes", before - kept.len());
        }

        let mut next_in_lane = [f32::INFINITY; LANE_COUNT as usize];
        let mut demoted = 0;
        for note in kept.iter_mut().rev() {
            let Some(next) = next_in_lane.get_mut(note.lane as usize) else {
                continue;
            };

            if note.kind == NoteKind::Long {
                let limit = (*next - self.release_gap).min(song_end);
                if note.end_time() > limit {
                    note.duration = limit - note.hit_time;
                }
                if note.duration < self.min_hold_duration {
                    note.kind = NoteKind::Tap;
                    note.duration = 0.0;
                    demoted += 1;
                }
            } else {
                note.duration = 0.0;
            }

            *next = note.hit_time;
        }
        if demoted > 0 {
            log::debug!("Demoted {} holds too short to play", demoted);
        }

        kept
    }
}
