use crate::onset::OnsetEvent;

pub const DEFAULT_BPM: f32 = 120.0;

const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;
const BPM_RESOLUTION: f32 = 0.5;
const PREFERRED_BPM: (f32, f32) = (120.0, 160.0);
const PREFERRED_BONUS: f32 = 1.2;
const MAX_MULTIPLE: u32 = 4;
const TOLERANCE_RATIO: f32 = 0.1;
const MIN_ONSETS: usize = 4;

/// Inter-onset intervals between consecutive onsets
pub fn inter_onset_intervals(onsets: &[OnsetEvent]) -> Vec<f32> {
    onsets.windows(2).map(|w| w[1].time - w[0].time).collect()
}

/// Histogram score of one BPM candidate against a set of IOIs.
///
/// Each IOI that sits within 10% of a beat interval of `m` beats adds
/// `(1/m) * (1 - err/tolerance)`. Candidates in the 120-160 range get a 1.2x bonus.
pub fn score_candidate(bpm: f32, intervals: &[f32]) -> f32 {
    let beat = 60.0 / bpm;
    let tolerance = beat * TOLERANCE_RATIO;

    let mut score = 0.0f32;
    for &ioi in intervals {
        for mult in 1..=MAX_MULTIPLE {
            let diff = (ioi - beat * mult as f32).abs();
            if diff < tolerance {
                score += (1.0 / mult as f32) * (1.0 - diff / tolerance);
            }
        }
    }

    if (PREFERRED_BPM.0..=PREFERRED_BPM.1).contains(&bpm) {
        score *= PREFERRED_BONUS;
    }
    score
}

/// Best-scoring candidate in 60-200 BPM at 0.5 BPM steps, before octave
/// correction. Falls back to 120 when nothing scores.
pub fn best_candidate(intervals: &[f32]) -> f32 {
    let steps = ((MAX_BPM - MIN_BPM) / BPM_RESOLUTION) as usize;

    let mut best_bpm = DEFAULT_BPM;
    let mut best_score = 0.0f32;
    for step in 0..=steps {
        let bpm = MIN_BPM + step as f32 * BPM_RESOLUTION;
        let score = score_candidate(bpm, intervals);
        if score > best_score {
            best_score = score;
            best_bpm = bpm;
        }
    }
    best_bpm
}

/// Fold a tempo into 80-180 BPM by doubling or halving
pub fn octave_correct(mut bpm: f32) -> f32 {
    if bpm <= 0.0 || !bpm.is_finite() {
        return DEFAULT_BPM;
    }
    while bpm < 80.0 {
        bpm *= 2.0;
    }
    while bpm > 180.0 {
        bpm /= 2.0;
    }
    bpm
}

/// Global tempo estimate from onset timing. Fewer than four onsets is not
/// enough evidence and yields the 120 BPM default.
pub fn estimate_bpm(onsets: &[OnsetEvent]) -> f32 {
    if onsets.len() < MIN_ONSETS {
        log::debug!("Only {} onsets, using default tempo", onsets.len());
        return DEFAULT_BPM;
    }

    let intervals = inter_onset_intervals(onsets);
    let raw = best_candidate(&intervals);
    let bpm = octave_correct(raw).round();
    log::debug!("Tempo candidate {:.1} BPM, corrected to {}", raw, bpm);
    bpm
}
