use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use crate::job::AnalysisJob;
use crate::onset::{OnsetDetector, OnsetEvent};
use crate::sections::{SectionSegment, SectionSegmenter};
use crate::spectral::{SpectralFrames, NUM_BANDS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Analysis parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub fft_size: usize,               // must be a power of two
    pub hop_size: usize,
    pub onset_window: usize,           // odd, frames in the adaptive threshold window
    pub onset_threshold_alpha: f32,    // stddev multiplier
    pub min_onset_interval: f32,       // seconds
    pub section_window_secs: f32,
    pub frames_per_chunk: usize,       // frames analyzed per job step
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            fft_size: 2048,
            hop_size: 512,
            onset_window: 7,
            onset_threshold_alpha: 1.5,
            min_onset_interval: 0.05,
            section_window_secs: 4.0,
            frames_per_chunk: 512,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(self.fft_size));
        }
        if self.hop_size == 0 {
            return Err(Error::InvalidConfig("hop_size must be at least 1".into()));
        }
        if self.onset_window < 3 || self.onset_window % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "onset_window must be odd and at least 3, got {}",
                self.onset_window
            )));
        }
        if !self.onset_threshold_alpha.is_finite() {
            return Err(Error::InvalidConfig("onset_threshold_alpha must be finite".into()));
        }
        if self.min_onset_interval.is_nan() || self.min_onset_interval < 0.0 {
            return Err(Error::InvalidConfig("min_onset_interval must be non-negative".into()));
        }
        if !(self.section_window_secs > 0.0 && self.section_window_secs.is_finite()) {
            return Err(Error::InvalidConfig("section_window_secs must be positive".into()));
        }
        if self.frames_per_chunk == 0 {
            return Err(Error::InvalidConfig("frames_per_chunk must be at least 1".into()));
        }
        Ok(())
    }

    pub(crate) fn onset_detector(&self, sample_rate: u32) -> OnsetDetector {
        OnsetDetector::new(
            self.onset_window,
            self.onset_threshold_alpha,
            self.min_onset_interval,
            self.hop_size,
            sample_rate,
        )
    }

    pub(crate) fn segmenter(&self, sample_rate: u32) -> SectionSegmenter {
        SectionSegmenter::new(self.section_window_secs, self.hop_size, sample_rate)
    }
}

/// Everything the analysis stage learns about a recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub bpm: f32,
    pub duration: f32,
    pub onsets: Vec<OnsetEvent>,
    pub sections: Vec<SectionSegment>,
    /// Total band energy per frame
    pub energy_profile: Vec<f32>,
    /// `frames x 8` band energies
    pub band_energies: Array2<f32>,
}

impl AnalysisResult {
    pub(crate) fn assemble(
        frames: SpectralFrames,
        onsets: Vec<OnsetEvent>,
        bpm: f32,
        sections: Vec<SectionSegment>,
        duration: f32,
    ) -> Self {
        let band_energies =
            Array2::from_shape_fn((frames.bands.len(), NUM_BANDS), |(f, b)| frames.bands[f][b]);

        AnalysisResult {
            bpm,
            duration,
            onsets,
            sections,
            energy_profile: frames.energy,
            band_energies,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.energy_profile.len()
    }
}

/// Entry point of the analysis pipeline
#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Analyzer { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Resumable analysis of `buffer`, advanced with [`AnalysisJob::step`]
    pub fn job<'a>(&self, buffer: &'a SampleBuffer) -> Result<AnalysisJob<'a>> {
        AnalysisJob::new(self.config.clone(), buffer)
    }

    /// Run the whole pipeline synchronously
    pub fn analyze(&self, buffer: &SampleBuffer) -> Result<AnalysisResult> {
        self.job(buffer)?.run(|_| {})
    }

    /// Like [`Analyzer::analyze`], with magnitude spectra computed on the rayon pool
    #[cfg(feature = "parallel")]
    pub fn analyze_parallel(&self, buffer: &SampleBuffer) -> Result<AnalysisResult> {
        use crate::spectral::{analyze_parallel, frame_count};

        let mono = buffer.to_mono();
        let sample_rate = buffer.sample_rate();
        let config = &self.config;
        if frame_count(mono.len(), config.fft_size, config.hop_size) == 0 {
            return Err(Error::TooShort {
                samples: mono.len(),
                required: config.fft_size,
            });
        }

        let frames = analyze_parallel(&mono, config.fft_size, config.hop_size, sample_rate)?;
        let onsets = config
            .onset_detector(sample_rate)
            .detect(&frames.flux, &frames.dominant_bands);
        let bpm = crate::tempo::estimate_bpm(&onsets);
        let duration = buffer.duration();
        let sections = config.segmenter(sample_rate).segment(&frames.energy, duration);

        Ok(AnalysisResult::assemble(frames, onsets, bpm, sections, duration))
    }
}
