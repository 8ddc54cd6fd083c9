//! Resumable analysis.
//!
//! An [`AnalysisJob`] advances the pipeline a bounded amount per
//! [`step`](AnalysisJob::step): a chunk of spectral frames, or one of the
//! onset, tempo and section stages. The host decides when to call it again,
//! so the job can run inline, on a UI idle hook or inside an async task.

use crate::analysis::{AnalysisResult, AnalyzerConfig};
use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use crate::onset::OnsetEvent;
use crate::sections::SectionSegment;
use crate::spectral::{frame_count, SpectralAnalyzer, SpectralFrames};
use crate::tempo;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Share of the progress range spent on spectral frames
const SPECTRAL_SHARE: f32 = 0.85;
const ONSETS_DONE: f32 = 0.9;
const TEMPO_DONE: f32 = 0.95;

/// Cloneable flag checked by a job before each step
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum JobStatus {
    /// More work remains; fraction complete in `[0, 1)`
    Running(f32),
    Finished(AnalysisResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Spectral { next_frame: usize },
    Onsets,
    Tempo,
    Sections,
    Done,
}

pub struct AnalysisJob<'a> {
    config: AnalyzerConfig,
    mono: Cow<'a, [f32]>,
    sample_rate: u32,
    duration: f32,
    total_frames: usize,
    spectral: SpectralAnalyzer,
    frames: SpectralFrames,
    onsets: Vec<OnsetEvent>,
    bpm: f32,
    stage: Stage,
    cancel: Option<CancellationToken>,
}

impl<'a> AnalysisJob<'a> {
    pub fn new(config: AnalyzerConfig, buffer: &'a SampleBuffer) -> Result<Self> {
        config.validate()?;

        let mono = buffer.to_mono();
        let total_frames = frame_count(mono.len(), config.fft_size, config.hop_size);
        if total_frames == 0 {
            return Err(Error::TooShort {
                samples: mono.len(),
                required: config.fft_size,
            });
        }

        let sample_rate = buffer.sample_rate();
        let spectral = SpectralAnalyzer::new(config.fft_size, config.hop_size, sample_rate)?;

        log::info!(
            "Analyzing {:.1}s of audio at {} Hz ({} channels, {} frames)",
            buffer.duration(),
            sample_rate,
            buffer.channels(),
            total_frames
        );

        Ok(AnalysisJob {
            config,
            mono,
            sample_rate,
            duration: buffer.duration(),
            total_frames,
            spectral,
            frames: SpectralFrames::with_capacity(total_frames),
            onsets: Vec::new(),
            bpm: tempo::DEFAULT_BPM,
            stage: Stage::Spectral { next_frame: 0 },
            cancel: None,
        })
    }

    /// Abort at the next step once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Do one bounded unit of work
    pub fn step(&mut self) -> Result<JobStatus> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            log::warn!("Analysis cancelled at stage {:?}", self.stage);
            self.stage = Stage::Done;
            return Err(Error::Cancelled);
        }

        match self.stage {
            Stage::Spectral { next_frame } => {
                let end = next_frame
                    .saturating_add(self.config.frames_per_chunk)
                    .min(self.total_frames);
                for frame in next_frame..end {
                    let features = self.spectral.analyze_frame(&self.mono, frame)?;
                    self.frames.push(features);
                }

                self.stage = if end == self.total_frames {
                    Stage::Onsets
                } else {
                    Stage::Spectral { next_frame: end }
                };
                Ok(JobStatus::Running(
                    SPECTRAL_SHARE * end as f32 / self.total_frames as f32,
                ))
            }
            Stage::Onsets => {
                let detector = self.config.onset_detector(self.sample_rate);
                self.onsets = detector.detect(&self.frames.flux, &self.frames.dominant_bands);
                log::info!("Detected {} onsets", self.onsets.len());
                self.stage = Stage::Tempo;
                Ok(JobStatus::Running(ONSETS_DONE))
            }
            Stage::Tempo => {
                self.bpm = tempo::estimate_bpm(&self.onsets);
                log::info!("Estimated tempo: {} BPM", self.bpm);
                self.stage = Stage::Sections;
                Ok(JobStatus::Running(TEMPO_DONE))
            }
            Stage::Sections => {
                let sections: Vec<SectionSegment> = self
                    .config
                    .segmenter(self.sample_rate)
                    .segment(&self.frames.energy, self.duration);
                log::info!("Detected {} sections", sections.len());

                self.stage = Stage::Done;
                Ok(JobStatus::Finished(AnalysisResult::assemble(
                    std::mem::take(&mut self.frames),
                    std::mem::take(&mut self.onsets),
                    self.bpm,
                    sections,
                    self.duration,
                )))
            }
            Stage::Done => Err(Error::JobFinished),
        }
    }

    /// Drive the job to completion, reporting progress after every step.
    /// The last reported value is exactly `1.0`.
    pub fn run(mut self, mut on_progress: impl FnMut(f32)) -> Result<AnalysisResult> {
        loop {
            match self.step()? {
                JobStatus::Running(progress) => on_progress(progress),
                JobStatus::Finished(result) => {
                    on_progress(1.0);
                    return Ok(result);
                }
            }
        }
    }

    /// Callback form of [`AnalysisJob::run`]: the outcome goes to `on_complete`
    pub fn run_with_callbacks(
        self,
        on_progress: impl FnMut(f32),
        on_complete: impl FnOnce(Result<AnalysisResult>),
    ) {
        on_complete(self.run(on_progress));
    }
}
