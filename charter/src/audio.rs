use crate::error::{Error, Result};
use std::borrow::Cow;

/// How multi-channel samples are arranged in a [`SampleBuffer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelLayout {
    /// `L R L R ...`
    #[default]
    Interleaved,
    /// All of channel 0, then all of channel 1, ...
    Planar,
}

/// Decoded PCM handed over by the host. Immutable once built.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    layout: ChannelLayout,
}

impl SampleBuffer {
    /// Wrap interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        Self::with_layout(samples, sample_rate, channels, ChannelLayout::Interleaved)
    }

    /// Wrap planar samples (one contiguous block per channel)
    pub fn planar(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        Self::with_layout(samples, sample_rate, channels, ChannelLayout::Planar)
    }

    pub fn with_layout(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        layout: ChannelLayout,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidChannelCount(channels));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        if samples.len() < channels as usize {
            return Err(Error::EmptyBuffer);
        }

        Ok(SampleBuffer {
            samples,
            sample_rate,
            channels,
            layout,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Number of samples per channel. A trailing partial frame is ignored.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Convert multi-channel audio to mono by averaging channels
    pub fn to_mono(&self) -> Cow<'_, [f32]> {
        if self.channels == 1 {
            return Cow::Borrowed(&self.samples);
        }

        let channels = self.channels as usize;
        let frames = self.frames();
        let scale = 1.0 / channels as f32;

        let mono = match self.layout {
            ChannelLayout::Interleaved => self
                .samples
                .chunks_exact(channels)
                .map(|chunk| chunk.iter().sum::<f32>() * scale)
                .collect(),
            ChannelLayout::Planar => {
                let mut mono = vec![0.0f32; frames];
                for plane in self.samples.chunks_exact(frames).take(channels) {
                    for (out, &sample) in mono.iter_mut().zip(plane) {
                        *out += sample;
                    }
                }
                mono.iter_mut().for_each(|s| *s *= scale);
                mono
            }
        };

        Cow::Owned(mono)
    }

    /// Get audio duration in seconds
    pub fn duration(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_duration_calculation() {
        let audio = SampleBuffer::new(vec![0.0; 44100], 44100, 2).unwrap();
        assert_eq!(audio.duration(), 0.5);
        assert_eq!(audio.frames(), 22050);
    }

    #[test]
    fn test_mono_passthrough_borrows() {
        let audio = SampleBuffer::new(vec![0.25, -0.5, 1.0], 8000, 1).unwrap();
        assert!(matches!(audio.to_mono(), Cow::Borrowed(_)));
        assert_eq!(&*audio.to_mono(), &[0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_interleaved_downmix_averages_channels() {
        let audio = SampleBuffer::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0, 0.9], 8000, 2).unwrap();
        let mono = audio.to_mono();
        assert_eq!(&*mono, &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_planar_downmix_matches_interleaved() {
        let planar = SampleBuffer::planar(vec![1.0, 0.5, -1.0, 0.0, 0.5, 1.0], 8000, 2).unwrap();
        let interleaved = SampleBuffer::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 8000, 2).unwrap();
        assert_eq!(planar.to_mono(), interleaved.to_mono());
    }

    #[test]
    fn test_rejects_invalid_buffers() {
        assert_eq!(SampleBuffer::new(vec![], 44100, 1).unwrap_err(), Error::EmptyBuffer);
        assert_eq!(
            SampleBuffer::new(vec![0.0; 4], 44100, 0).unwrap_err(),
            Error::InvalidChannelCount(0)
        );
        assert_eq!(
            SampleBuffer::new(vec![0.0; 4], 0, 1).unwrap_err(),
            Error::InvalidSampleRate(0)
        );
    }
}
