use serde::{Deserialize, Serialize};

/// A detected rhythmic attack
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvent {
    /// Seconds from the start of the recording
    pub time: f32,
    /// Raw spectral flux at the onset frame
    pub strength: f32,
    /// Loudest frequency band at the onset frame (0-7)
    pub dominant_band: u8,
}

/// Adaptive-threshold peak picker over a spectral flux signal.
///
/// A frame is an onset when its flux exceeds `mean + alpha * stddev` of the
/// surrounding window, it is a local maximum (strict on the left, ties allowed
/// on the right), and it comes at least `min_interval` seconds after the last
/// accepted onset.
#[derive(Clone, Debug)]
pub struct OnsetDetector {
    window: usize,
    threshold_alpha: f32,
    min_interval: f32,
    hop_size: usize,
    sample_rate: u32,
}

impl OnsetDetector {
    pub fn new(
        window: usize,
        threshold_alpha: f32,
        min_interval: f32,
        hop_size: usize,
        sample_rate: u32,
    ) -> Self {
        OnsetDetector {
            window: window.max(3),
            threshold_alpha,
            min_interval,
            hop_size,
            sample_rate,
        }
    }

    fn half_window(&self) -> usize {
        self.window / 2
    }

    fn frame_time(&self, frame: usize) -> f32 {
        (frame * self.hop_size) as f32 / self.sample_rate as f32
    }

    /// `mean + alpha * stddev` of the flux window centred on `index`.
    /// `index` must have a full half-window on both sides.
    pub fn adaptive_threshold(&self, flux: &[f32], index: usize) -> f32 {
        let half = self.half_window();
        let window = &flux[index - half..=index + half];
        let n = window.len() as f32;

        let mean = window.iter().sum::<f32>() / n;
        let variance = window.iter().map(|f| (f - mean) * (f - mean)).sum::<f32>() / n;

        mean + self.threshold_alpha * variance.sqrt()
    }

    /// Pick onsets from `flux`, tagging each with the frame's dominant band
    pub fn detect(&self, flux: &[f32], dominant_bands: &[u8]) -> Vec<OnsetEvent> {
        let half = self.half_window();
        let frames = flux.len().min(dominant_bands.len());
        let mut onsets = Vec::new();

        if frames <= 2 * half {
            return onsets;
        }

        let mut last_time = f32::NEG_INFINITY;

        for i in half..frames - half {
            let value = flux[i];
            if value <= self.adaptive_threshold(flux, i) {
                continue;
            }
            if !(value > flux[i - 1] && value >= flux[i + 1]) {
                continue;
            }

            let time = self.frame_time(i);
            if time - last_time >= self.min_interval {
                onsets.push(OnsetEvent {
                    time,
                    strength: value,
                    dominant_band: dominant_bands[i],
                });
                last_time = time;
            }
        }

        log::debug!("Picked {} onsets from {} flux frames", onsets.len(), frames);
        onsets
    }
}
