use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Build,
    Drop,
    Outro,
    Calm,
}

impl SectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Intro => "intro",
            SectionKind::Build => "build",
            SectionKind::Drop => "drop",
            SectionKind::Outro => "outro",
            SectionKind::Calm => "calm",
        }
    }

    /// Note density multiplier used when charting this kind of section
    pub fn density_multiplier(&self) -> f32 {
        match self {
            SectionKind::Intro => 0.4,
            SectionKind::Build => 0.8,
            SectionKind::Drop => 1.5,
            SectionKind::Outro => 0.3,
            SectionKind::Calm => 0.5,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A contiguous region of the song with one energy classification
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionSegment {
    pub start: f32,
    pub end: f32,
    pub kind: SectionKind,
    pub avg_energy: f32,
}

impl SectionSegment {
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start && time < self.end
    }
}

/// Coarse structural segmentation from the per-frame energy envelope.
#[derive(Clone, Debug)]
pub struct SectionSegmenter {
    window_secs: f32,
    hop_size: usize,
    sample_rate: u32,
}

impl SectionSegmenter {
    pub fn new(window_secs: f32, hop_size: usize, sample_rate: u32) -> Self {
        SectionSegmenter {
            window_secs,
            hop_size,
            sample_rate,
        }
    }

    fn frame_time(&self) -> f32 {
        self.hop_size as f32 / self.sample_rate as f32
    }

    /// Frames per classification window, at least one
    pub fn window_frames(&self) -> usize {
        ((self.window_secs / self.frame_time()).round() as usize).max(1)
    }

    /// Classify window `index` of `count` given its mean normalized energy.
    /// The first two windows are intro and the last two outro.
    pub fn classify(index: usize, count: usize, energy: f32, global_mean: f32) -> SectionKind {
        if index < 2 {
            SectionKind::Intro
        } else if index + 2 >= count {
            SectionKind::Outro
        } else if energy > global_mean * 1.3 {
            SectionKind::Drop
        } else if energy > global_mean * 0.8 {
            SectionKind::Build
        } else {
            SectionKind::Calm
        }
    }

    /// Split `[0, duration]` into merged, gap-free segments
    pub fn segment(&self, energy: &[f32], duration: f32) -> Vec<SectionSegment> {
        let max_energy = energy.iter().cloned().fold(0.0f32, f32::max);
        if max_energy <= 0.0 {
            return vec![SectionSegment {
                start: 0.0,
                end: duration,
                kind: SectionKind::Calm,
                avg_energy: 0.0,
            }];
        }

        let frames = energy.len();
        let window = self.window_frames();
        let count = (frames / window).max(1);
        let frame_time = self.frame_time();

        let window_energies: Vec<f32> = (0..count)
            .map(|w| {
                let start = w * window;
                let end = (start + window).min(frames);
                let sum: f32 = energy[start..end].iter().map(|e| e / max_energy).sum();
                sum / (end - start) as f32
            })
            .collect();
        let global_mean = window_energies.iter().sum::<f32>() / count as f32;

        let mut segments: Vec<SectionSegment> = Vec::new();
        for (w, &avg) in window_energies.iter().enumerate() {
            let kind = Self::classify(w, count, avg, global_mean);
            let start = (w * window) as f32 * frame_time;
            let end = (((w + 1) * window) as f32 * frame_time).min(duration);

            match segments.last_mut() {
                Some(last) if last.kind == kind => {
                    // unweighted running average across merged windows
                    last.end = end;
                    last.avg_energy = (last.avg_energy + avg) / 2.0;
                }
                Some(last) => {
                    last.end = start;
                    segments.push(SectionSegment {
                        start,
                        end,
                        kind,
                        avg_energy: avg,
                    });
                }
                None => segments.push(SectionSegment {
                    start: 0.0,
                    end,
                    kind,
                    avg_energy: avg,
                }),
            }
        }

        if let Some(last) = segments.last_mut() {
            last.end = duration;
        }

        log::debug!(
            "Segmented {} windows of {} frames into {} sections",
            count,
            window,
            segments.len()
        );
        segments
    }
}

/// Segment containing `time`, or the last segment when `time` is past the end
pub fn section_at(sections: &[SectionSegment], time: f32) -> Option<&SectionSegment> {
    sections
        .iter()
        .find(|s| s.contains(time))
        .or_else(|| sections.last())
}
