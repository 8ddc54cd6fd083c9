use crate::note::{KEY_LANES, LANE_COUNT, LEFT_EDGE_LANE, RIGHT_EDGE_LANE};
use crate::spectral::NUM_BANDS;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lane for each of the 8 analysis bands: sub-bass and the top two bands go
/// to the edges, the mids to the key lanes.
pub const BAND_TO_LANE: [u8; NUM_BANDS] = [0, 1, 1, 2, 2, 1, 3, 3];

/// Longest run of identical lanes allowed before a shift
const MAX_REPEATS: usize = 2;

/// Generator for chart randomness. Seed 0 draws from OS entropy; any other
/// seed makes the sequence reproducible for the same crate version.
pub fn seeded_rng(seed: u64) -> StdRng {
    if seed == 0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(seed)
    }
}

pub fn band_to_lane(band: u8) -> u8 {
    BAND_TO_LANE
        .get(band as usize)
        .copied()
        .unwrap_or(RIGHT_EDGE_LANE)
}

/// Move a lane one step: edge lanes inward, key lanes randomly left or right
pub fn shift_lane<R: Rng>(lane: u8, rng: &mut R) -> u8 {
    match lane {
        LEFT_EDGE_LANE => LEFT_EDGE_LANE + 1,
        RIGHT_EDGE_LANE => RIGHT_EDGE_LANE - 1,
        _ if rng.gen_bool(0.5) => lane - 1,
        _ => (lane + 1).min(LANE_COUNT - 1),
    }
}

pub fn random_key_lane<R: Rng>(rng: &mut R) -> u8 {
    rng.gen_range(KEY_LANES[0]..=KEY_LANES[1])
}

pub fn random_edge_lane<R: Rng>(rng: &mut R) -> u8 {
    if rng.gen_bool(0.5) {
        LEFT_EDGE_LANE
    } else {
        RIGHT_EDGE_LANE
    }
}

pub fn random_lane<R: Rng>(rng: &mut R) -> u8 {
    rng.gen_range(0..LANE_COUNT)
}

/// Band-driven lane choice that breaks up long runs on one lane
#[derive(Clone, Debug, Default)]
pub struct LaneAssigner {
    prev_lane: Option<u8>,
    run: usize,
}

impl LaneAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lane for a note whose onset is dominated by `band`
    pub fn assign<R: Rng>(&mut self, band: u8, rng: &mut R) -> u8 {
        let mut lane = band_to_lane(band);

        if self.prev_lane == Some(lane) {
            if self.run >= MAX_REPEATS {
                lane = shift_lane(lane, rng);
                self.run = 1;
            } else {
                self.run += 1;
            }
        } else {
            self.run = 1;
        }

        self.prev_lane = Some(lane);
        lane
    }
}
