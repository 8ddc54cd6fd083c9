use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const LANE_COUNT: u8 = 4;
pub const LEFT_EDGE_LANE: u8 = 0;
pub const RIGHT_EDGE_LANE: u8 = 3;
pub const KEY_LANES: [u8; 2] = [1, 2];

/// Notes closer than this are played as one chord
pub const SAME_TIME_EPSILON: f32 = 0.01;

/// Lanes 0 and 3 sit at the edges of the playfield and take scratches
pub fn is_edge_lane(lane: u8) -> bool {
    lane == LEFT_EDGE_LANE || lane == RIGHT_EDGE_LANE
}

pub fn is_key_lane(lane: u8) -> bool {
    KEY_LANES.contains(&lane)
}

/// Edge lane on the same side of the playfield as `lane`
pub fn nearest_edge_lane(lane: u8) -> u8 {
    if lane < LANE_COUNT / 2 {
        LEFT_EDGE_LANE
    } else {
        RIGHT_EDGE_LANE
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Tap,
    Long,
    Scratch,
}

impl NoteKind {
    pub fn name(&self) -> &'static str {
        match self {
            NoteKind::Tap => "tap",
            NoteKind::Long => "long",
            NoteKind::Scratch => "scratch",
        }
    }
}

/// One gameplay event. `duration` is positive for long notes and zero otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub hit_time: f32,
    pub lane: u8,
    pub kind: NoteKind,
    pub duration: f32,
}

impl NoteEvent {
    pub fn tap(hit_time: f32, lane: u8) -> Self {
        NoteEvent {
            hit_time,
            lane,
            kind: NoteKind::Tap,
            duration: 0.0,
        }
    }

    pub fn long(hit_time: f32, lane: u8, duration: f32) -> Self {
        NoteEvent {
            hit_time,
            lane,
            kind: NoteKind::Long,
            duration,
        }
    }

    pub fn scratch(hit_time: f32, lane: u8) -> Self {
        NoteEvent {
            hit_time,
            lane,
            kind: NoteKind::Scratch,
            duration: 0.0,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.hit_time + self.duration
    }

    /// Whether `other` lands on the same lane at (nearly) the same time
    pub fn collides_with(&self, other: &NoteEvent) -> bool {
        self.lane == other.lane && (self.hit_time - other.hit_time).abs() < SAME_TIME_EPSILON
    }
}

/// Stable sort by hit time, then lane
pub fn sort_by_time(notes: &mut [NoteEvent]) {
    notes.sort_by(|a, b| {
        a.hit_time
            .partial_cmp(&b.hit_time)
            .unwrap_or(Ordering::Equal)
            .then(a.lane.cmp(&b.lane))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_lanes() {
        assert!(is_edge_lane(0));
        assert!(is_edge_lane(3));
        assert!(!is_edge_lane(1));
        assert!(!is_edge_lane(2));
        assert_eq!(nearest_edge_lane(1), 0);
        assert_eq!(nearest_edge_lane(2), 3);
    }

    #[test]
    fn test_sort_by_time_then_lane() {
        let mut notes = vec![
            NoteEvent::tap(1.0, 2),
            NoteEvent::long(0.5, 1, 0.3),
            NoteEvent::tap(1.0, 1),
        ];
        sort_by_time(&mut notes);
        assert_eq!(notes[0].hit_time, 0.5);
        assert_eq!(notes[1].lane, 1);
        assert_eq!(notes[2].lane, 2);
    }

    #[test]
    fn test_note_kind_serializes_lowercase() {
        let json = serde_json::to_string(&NoteEvent::scratch(1.5, 0)).unwrap();
        assert!(json.contains("\"kind\":\"scratch\""));
        assert_eq!(NoteKind::Long.name(), "long");
    }

    #[test]
    fn test_collision_window() {
        let a = NoteEvent::tap(2.0, 1);
        assert!(a.collides_with(&NoteEvent::tap(2.005, 1)));
        assert!(!a.collides_with(&NoteEvent::tap(2.005, 2)));
        assert!(!a.collides_with(&NoteEvent::tap(2.02, 1)));
    }
}
