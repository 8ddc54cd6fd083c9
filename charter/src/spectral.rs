//! Per-frame spectral features: magnitude spectrum, half-wave rectified
//! spectral flux, eight band energies and the dominant band.

use crate::error::Result;
use crate::fft::{Direction, FftEngine};

pub const NUM_BANDS: usize = 8;

/// Band edges in Hz, widening roughly by octaves
pub const BAND_EDGES_HZ: [f32; NUM_BANDS + 1] =
    [0.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 20000.0];

/// Number of full frames of `fft_size` samples taken every `hop_size` samples
pub fn frame_count(len: usize, fft_size: usize, hop_size: usize) -> usize {
    if len < fft_size || hop_size == 0 {
        0
    } else {
        (len - fft_size) / hop_size + 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameFeatures {
    pub flux: f32,
    /// Sum of the band energies
    pub energy: f32,
    pub bands: [f32; NUM_BANDS],
    pub dominant_band: u8,
}

/// Column-wise store of every analyzed frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectralFrames {
    pub flux: Vec<f32>,
    pub energy: Vec<f32>,
    pub bands: Vec<[f32; NUM_BANDS]>,
    pub dominant_bands: Vec<u8>,
}

impl SpectralFrames {
    pub fn with_capacity(frames: usize) -> Self {
        SpectralFrames {
            flux: Vec::with_capacity(frames),
            energy: Vec::with_capacity(frames),
            bands: Vec::with_capacity(frames),
            dominant_bands: Vec::with_capacity(frames),
        }
    }

    pub fn push(&mut self, frame: FrameFeatures) {
        self.flux.push(frame.flux);
        self.energy.push(frame.energy);
        self.bands.push(frame.bands);
        self.dominant_bands.push(frame.dominant_band);
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}

/// Inclusive bin range for each band; `start > end` marks an empty band.
pub fn band_bin_ranges(sample_rate: u32, fft_size: usize) -> [(usize, usize); NUM_BANDS] {
    let resolution = sample_rate as f32 / fft_size as f32;
    let last_bin = fft_size / 2 - 1;

    let mut ranges = [(0usize, 0usize); NUM_BANDS];
    for (band, range) in ranges.iter_mut().enumerate() {
        let start = ((BAND_EDGES_HZ[band] / resolution).floor() as usize).max(1);
        let end = ((BAND_EDGES_HZ[band + 1] / resolution).floor() as usize).min(last_bin);
        *range = (start, end);
    }
    ranges
}

/// SF = Σ max(0, |X_t[k]| - |X_(t-1)[k]|)
pub fn spectral_flux(current: &[f32], previous: &[f32]) -> f32 {
    current
        .iter()
        .zip(previous)
        .map(|(cur, prev)| (cur - prev).max(0.0))
        .sum()
}

/// Sum of squared magnitudes inside each band
pub fn band_energies(spectrum: &[f32], ranges: &[(usize, usize); NUM_BANDS]) -> [f32; NUM_BANDS] {
    let mut energies = [0.0f32; NUM_BANDS];
    for (energy, &(start, end)) in energies.iter_mut().zip(ranges) {
        if start <= end {
            *energy = spectrum[start..=end].iter().map(|m| m * m).sum();
        }
    }
    energies
}

/// Index of the first strictly largest band; silent frames report band 0.
pub fn dominant_band(bands: &[f32; NUM_BANDS]) -> u8 {
    let mut best = 0;
    let mut best_energy = 0.0f32;
    for (band, &energy) in bands.iter().enumerate() {
        if energy > best_energy {
            best_energy = energy;
            best = band;
        }
    }
    best as u8
}

/// Window one frame (zero-padded past the end of `mono`), transform it and
/// write the first `N/2` magnitudes into `out`.
pub(crate) fn magnitude_spectrum(
    engine: &FftEngine,
    mono: &[f32],
    offset: usize,
    real: &mut [f32],
    imag: &mut [f32],
    out: &mut [f32],
) -> Result<()> {
    let window = engine.window();
    for (i, (re, im)) in real.iter_mut().zip(imag.iter_mut()).enumerate() {
        *re = mono.get(offset + i).map_or(0.0, |&s| s * window[i]);
        *im = 0.0;
    }

    engine.process(real, imag, Direction::Forward)?;

    for (i, mag) in out.iter_mut().enumerate() {
        *mag = (real[i] * real[i] + imag[i] * imag[i]).sqrt();
    }
    Ok(())
}

/// Sequential frame analyzer with reusable scratch buffers.
///
/// Frames must be fed in order: each frame's flux is measured against the
/// spectrum of the frame analyzed just before it.
pub struct SpectralAnalyzer {
    engine: FftEngine,
    hop_size: usize,
    band_ranges: [(usize, usize); NUM_BANDS],
    real: Vec<f32>,
    imag: Vec<f32>,
    spectrum: Vec<f32>,
    previous: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(fft_size: usize, hop_size: usize, sample_rate: u32) -> Result<Self> {
        let engine = FftEngine::new(fft_size)?;
        Ok(SpectralAnalyzer {
            engine,
            hop_size,
            band_ranges: band_bin_ranges(sample_rate, fft_size),
            real: vec![0.0; fft_size],
            imag: vec![0.0; fft_size],
            spectrum: vec![0.0; fft_size / 2],
            previous: vec![0.0; fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.engine.size()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Forget the previous spectrum so the next frame compares against silence
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyze frame `frame` of `mono`
    pub fn analyze_frame(&mut self, mono: &[f32], frame: usize) -> Result<FrameFeatures> {
        magnitude_spectrum(
            &self.engine,
            mono,
            frame * self.hop_size,
            &mut self.real,
            &mut self.imag,
            &mut self.spectrum,
        )?;

        let features = self.features_from_spectrum();
        std::mem::swap(&mut self.spectrum, &mut self.previous);
        Ok(features)
    }

    /// Run every frame of `mono` from a clean state
    pub fn analyze_all(&mut self, mono: &[f32]) -> Result<SpectralFrames> {
        let total = frame_count(mono.len(), self.fft_size(), self.hop_size);
        let mut frames = SpectralFrames::with_capacity(total);

        self.reset();
        for frame in 0..total {
            frames.push(self.analyze_frame(mono, frame)?);
        }
        Ok(frames)
    }

    fn features_from_spectrum(&self) -> FrameFeatures {
        let flux = spectral_flux(&self.spectrum, &self.previous);
        let bands = band_energies(&self.spectrum, &self.band_ranges);
        FrameFeatures {
            flux,
            energy: bands.iter().sum(),
            bands,
            dominant_band: dominant_band(&bands),
        }
    }
}

#[cfg(feature = "parallel")]
const PARALLEL_BLOCK_FRAMES: usize = 256;

/// Same output as [`SpectralAnalyzer::analyze_all`], with magnitude spectra
/// computed on the rayon pool one block of frames at a time. Flux and band
/// energies are then taken in a sequential pass over each block.
#[cfg(feature = "parallel")]
pub fn analyze_parallel(
    mono: &[f32],
    fft_size: usize,
    hop_size: usize,
    sample_rate: u32,
) -> Result<SpectralFrames> {
    use rayon::prelude::*;

    let engine = FftEngine::new(fft_size)?;
    let half = fft_size / 2;
    let band_ranges = band_bin_ranges(sample_rate, fft_size);
    let total = frame_count(mono.len(), fft_size, hop_size);

    let mut frames = SpectralFrames::with_capacity(total);
    let mut previous = vec![0.0f32; half];
    let mut block = vec![0.0f32; PARALLEL_BLOCK_FRAMES.min(total.max(1)) * half];

    for block_start in (0..total).step_by(PARALLEL_BLOCK_FRAMES) {
        let block_len = PARALLEL_BLOCK_FRAMES.min(total - block_start);
        let rows = &mut block[..block_len * half];

        rows.par_chunks_mut(half).enumerate().try_for_each_init(
            || (vec![0.0f32; fft_size], vec![0.0f32; fft_size]),
            |(real, imag), (i, row)| {
                let offset = (block_start + i) * hop_size;
                magnitude_spectrum(&engine, mono, offset, real, imag, row)
            },
        )?;

        for row in rows.chunks_exact(half) {
            let bands = band_energies(row, &band_ranges);
            frames.push(FrameFeatures {
                flux: spectral_flux(row, &previous),
                energy: bands.iter().sum(),
                bands,
                dominant_band: dominant_band(&bands),
            });
            previous.copy_from_slice(row);
        }
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(2048, 2048, 512), 1);
        assert_eq!(frame_count(2047, 2048, 512), 0);
        assert_eq!(frame_count(2048 + 512 * 10 + 100, 2048, 512), 11);
        assert_eq!(frame_count(0, 2048, 512), 0);
    }

    #[test]
    fn test_band_ranges_at_44100() {
        let ranges = band_bin_ranges(44100, 2048);
        // resolution ≈ 21.5 Hz per bin
        assert_eq!(ranges[0], (1, 4));
        assert_eq!(ranges[1], (4, 9));
        assert_eq!(ranges[7].1, 928);
    }

    #[test]
    fn test_band_ranges_clamp_to_nyquist() {
        let ranges = band_bin_ranges(16000, 2048);
        assert_eq!(ranges[7].1, 1023);
        assert!(ranges.iter().all(|&(s, e)| s >= 1 && (s > e || e <= 1023)));
    }

    #[test]
    fn test_flux_is_half_wave_rectified() {
        let previous = [1.0, 2.0, 3.0];
        let current = [2.0, 1.0, 3.5];
        assert!((spectral_flux(&current, &previous) - 1.5).abs() < 1e-6);
        assert_eq!(spectral_flux(&previous, &[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_dominant_band_prefers_first_maximum() {
        assert_eq!(dominant_band(&[0.0; NUM_BANDS]), 0);
        assert_eq!(dominant_band(&[1.0, 3.0, 3.0, 0.0, 0.0, 0.0, 0.0, 2.0]), 1);
    }

    #[test]
    fn test_low_sine_lands_in_low_band() {
        let sample_rate = 44100;
        let samples = sine(60.0, sample_rate, 2048 * 4);
        let mut analyzer = SpectralAnalyzer::new(2048, 512, sample_rate).unwrap();
        let frames = analyzer.analyze_all(&samples).unwrap();

        assert_eq!(frames.len(), frame_count(samples.len(), 2048, 512));
        assert!(frames.dominant_bands.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mid_sine_lands_in_mid_band() {
        let sample_rate = 44100;
        let samples = sine(1000.0, sample_rate, 2048 * 2);
        let mut analyzer = SpectralAnalyzer::new(2048, 512, sample_rate).unwrap();
        let frames = analyzer.analyze_all(&samples).unwrap();
        assert!(frames.dominant_bands.iter().all(|&b| b == 4));
    }

    #[test]
    fn test_flux_never_negative_and_first_frame_compares_to_silence() {
        let sample_rate = 22050;
        let mut samples = sine(440.0, sample_rate, 22050);
        samples.iter_mut().skip(11025).for_each(|s| *s *= 0.1);

        let mut analyzer = SpectralAnalyzer::new(2048, 512, sample_rate).unwrap();
        let frames = analyzer.analyze_all(&samples).unwrap();

        assert!(frames.flux.iter().all(|&f| f >= 0.0));
        assert!(frames.flux[0] > 0.0);
        let energy_sum: f32 = frames.bands[3].iter().sum();
        assert!((frames.energy[3] - energy_sum).abs() <= energy_sum * 1e-6);
    }

    #[test]
    fn test_silence_produces_zero_features() {
        let mut analyzer = SpectralAnalyzer::new(1024, 256, 8000).unwrap();
        let frames = analyzer.analyze_all(&vec![0.0; 4096]).unwrap();
        assert_eq!(frames.len(), 13);
        assert!(frames.flux.iter().all(|&f| f == 0.0));
        assert!(frames.energy.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_zero_padding_past_buffer_end() {
        let engine = FftEngine::new(8).unwrap();
        let mut real = vec![0.0; 8];
        let mut imag = vec![0.0; 8];
        let mut out = vec![0.0; 4];
        magnitude_spectrum(&engine, &[1.0; 6], 4, &mut real, &mut imag, &mut out).unwrap();
        assert!(out.iter().all(|m| m.is_finite()));
        assert!(out[0] > 0.0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let sample_rate = 22050;
        let samples: Vec<f32> = sine(330.0, sample_rate, 22050 * 3)
            .iter()
            .enumerate()
            .map(|(i, s)| if (i / 5000) % 2 == 0 { *s } else { s * 0.2 })
            .collect();

        let mut analyzer = SpectralAnalyzer::new(2048, 512, sample_rate).unwrap();
        let sequential = analyzer.analyze_all(&samples).unwrap();
        let parallel = analyze_parallel(&samples, 2048, 512, sample_rate).unwrap();
        assert_eq!(sequential, parallel);
    }
}
