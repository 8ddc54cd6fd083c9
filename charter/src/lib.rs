pub mod analysis;
pub mod audio;
pub mod bpm_mapper;
pub mod error;
pub mod exporter;
pub mod fft;
pub mod hold_detector;
pub mod job;
pub mod lane_assigner;
pub mod note;
pub mod onset;
pub mod sections;
pub mod smart_mapper;
pub mod spectral;
pub mod tempo;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{AnalysisResult, Analyzer, AnalyzerConfig};
pub use audio::{ChannelLayout, SampleBuffer};
pub use bpm_mapper::{default_sections, BpmBeatMapper, BpmMapperConfig, SongInfo, SongSection};
pub use error::{Error, Result};
pub use job::{AnalysisJob, CancellationToken, JobStatus};
pub use note::{NoteEvent, NoteKind};
pub use sections::SectionKind;
pub use smart_mapper::{MapperConfig, SmartBeatMapper};

use serde::{Deserialize, Serialize};

/// Main charter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharterConfig {
    pub analyzer: AnalyzerConfig,
    pub mapper: MapperConfig,
    pub fallback: BpmMapperConfig,
    pub fallback_bpm: f32,      // used when analysis fails and the caller gave no tempo
    pub fallback_duration: f32, // seconds, when neither the caller nor the audio gives a length
    pub fallback_seed: u64,     // 0 = entropy
}

impl Default for CharterConfig {
    fn default() -> Self {
        CharterConfig {
            analyzer: AnalyzerConfig::default(),
            mapper: MapperConfig::default(),
            fallback: BpmMapperConfig::default(),
            fallback_bpm: tempo::DEFAULT_BPM,
            fallback_duration: 30.0,
            fallback_seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    /// Generated from onsets found in the audio
    Analysis,
    /// Generated from tempo and sections alone
    Fallback,
}

impl ChartSource {
    pub fn name(&self) -> &'static str {
        match self {
            ChartSource::Analysis => "analysis",
            ChartSource::Fallback => "fallback",
        }
    }
}

/// A generated chart and the song facts it was built from
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    pub bpm: f32,
    pub duration: f32,
    pub source: ChartSource,
    pub sections: Vec<SongSection>,
    pub notes: Vec<NoteEvent>,
}

/// What the caller knows about a song up front. Anything missing is
/// filled from the configuration when the fallback generator runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SongHint {
    pub bpm: Option<f32>,
    pub duration: Option<f32>,
    pub sections: Option<Vec<SongSection>>,
}

/// Main charter that orchestrates analysis and chart generation
pub struct Charter {
    config: CharterConfig,
}

impl Charter {
    pub fn new(config: CharterConfig) -> Self {
        Charter { config }
    }

    pub fn config(&self) -> &CharterConfig {
        &self.config
    }

    pub fn analyze(&self, buffer: &SampleBuffer) -> Result<AnalysisResult> {
        Analyzer::new(self.config.analyzer.clone())?.analyze(buffer)
    }

    /// Smart chart from a finished analysis
    pub fn chart_from_analysis(&self, analysis: &AnalysisResult) -> Chart {
        let notes = SmartBeatMapper::new(self.config.mapper.clone()).generate(analysis);
        Chart {
            bpm: analysis.bpm,
            duration: analysis.duration,
            source: ChartSource::Analysis,
            sections: SongSection::from_analysis(analysis),
            notes,
        }
    }

    /// Beat-grid chart from the hint, with configured defaults for the gaps
    pub fn fallback_chart(&self, hint: &SongHint, duration: f32) -> Chart {
        let bpm = bpm_mapper::sanitize_bpm(hint.bpm.unwrap_or(self.config.fallback_bpm));
        let sections = hint
            .sections
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_sections(duration));

        let notes = BpmBeatMapper::new(self.config.fallback.clone()).generate_from_bpm(
            bpm,
            duration,
            &sections,
            self.config.fallback_seed,
        );
        Chart {
            bpm,
            duration,
            source: ChartSource::Fallback,
            sections,
            notes,
        }
    }

    /// Difficulty-scaled beat-grid chart for a described song
    pub fn song_chart(&self, song: &SongInfo) -> Chart {
        let mut song = song.clone();
        song.bpm = bpm_mapper::sanitize_bpm(song.bpm);
        if song.sections.is_empty() {
            song.sections = default_sections(song.duration);
        }

        let notes = BpmBeatMapper::new(self.config.fallback.clone())
            .generate_for_song(&song, self.config.fallback_seed);
        Chart {
            bpm: song.bpm,
            duration: song.duration,
            source: ChartSource::Fallback,
            sections: song.sections,
            notes,
        }
    }

    /// Analyze `audio` and chart it, falling back to the beat-grid generator
    /// when there is no audio or analysis fails. Always returns a chart.
    pub fn chart(&self, audio: Option<&SampleBuffer>, hint: &SongHint) -> Chart {
        let duration = hint
            .duration
            .or_else(|| audio.map(|a| a.duration()))
            .filter(|d| *d > 0.0 && d.is_finite())
            .unwrap_or(self.config.fallback_duration);

        match audio {
            Some(buffer) => match self.analyze(buffer) {
                Ok(analysis) => return self.chart_from_analysis(&analysis),
                Err(e) => log::warn!("Analysis failed ({}), using the beat-grid generator", e),
            },
            None => log::warn!("No audio supplied, using the beat-grid generator"),
        }

        self.fallback_chart(hint, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{click_track, metronome};

    fn seeded() -> Charter {
        Charter::new(CharterConfig {
            mapper: MapperConfig {
                seed: 17,
                ..Default::default()
            },
            fallback_seed: 17,
            ..Default::default()
        })
    }

    #[test]
    fn test_charter_config_default() {
        let config = CharterConfig::default();
        assert_eq!(config.fallback_bpm, 120.0);
        assert_eq!(config.fallback_duration, 30.0);
        assert_eq!(config.mapper.difficulty, 5);
        assert_eq!(config.analyzer.fft_size, 2048);
    }

    #[test]
    fn test_charter_config_partial_json() {
        let config: CharterConfig =
            serde_json::from_str(r#"{"mapper": {"difficulty": 9}, "fallback_bpm": 140}"#).unwrap();
        assert_eq!(config.mapper.difficulty, 9);
        assert_eq!(config.mapper.min_note_interval, 0.15);
        assert_eq!(config.fallback_bpm, 140.0);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }

    #[test]
    fn test_audio_is_charted_from_analysis() {
        let buffer = metronome(20.0, 120.0, 1.0, 19.0);
        let chart = seeded().chart(Some(&buffer), &SongHint::default());
        assert_eq!(chart.source, ChartSource::Analysis);
        assert_eq!(chart.bpm, 120.0);
        assert_eq!(chart.duration, 20.0);
        assert!(!chart.notes.is_empty());
    }

    #[test]
    fn test_short_audio_falls_back() {
        let buffer = click_track(0.05, &[]);
        let hint = SongHint {
            bpm: Some(100.0),
            duration: Some(30.0),
            sections: None,
        };
        let chart = seeded().chart(Some(&buffer), &hint);
        assert_eq!(chart.source, ChartSource::Fallback);
        assert_eq!(chart.bpm, 100.0);
        assert_eq!(chart.sections.len(), 4);
        assert!(!chart.notes.is_empty());
        assert!(chart.notes.iter().all(|n| n.hit_time < 30.0));
    }

    #[test]
    fn test_no_audio_uses_configured_defaults() {
        let hint = SongHint {
            duration: Some(40.0),
            ..Default::default()
        };
        let charter = seeded();
        let chart = charter.chart(None, &hint);
        assert_eq!(chart.source, ChartSource::Fallback);
        assert_eq!(chart.bpm, 120.0);
        assert_eq!(chart, charter.chart(None, &hint));
    }

    #[test]
    fn test_no_audio_and_no_length_uses_default_duration() {
        let chart = seeded().chart(None, &SongHint::default());
        assert_eq!(chart.source, ChartSource::Fallback);
        assert_eq!(chart.duration, 30.0);
        assert!(!chart.notes.is_empty());
        assert!(chart.notes.iter().all(|n| n.hit_time < 30.0));

        let hint = SongHint {
            duration: Some(f32::NAN),
            ..Default::default()
        };
        assert_eq!(seeded().chart(None, &hint).duration, 30.0);
    }

    #[test]
    fn test_caller_sections_are_used() {
        let sections = vec![SongSection::new(SectionKind::Calm, 0.0, 20.0, 1.0)];
        let hint = SongHint {
            bpm: Some(120.0),
            duration: Some(20.0),
            sections: Some(sections.clone()),
        };
        let chart = seeded().chart(None, &hint);
        assert_eq!(chart.sections, sections);
        assert_eq!(chart.notes.len(), 40);
    }

    #[test]
    fn test_song_chart_fills_missing_sections() {
        let song = SongInfo {
            bpm: 500.0,
            duration: 60.0,
            difficulty: 8,
            sections: Vec::new(),
        };
        let chart = seeded().song_chart(&song);
        assert_eq!(chart.bpm, 120.0);
        assert_eq!(chart.sections.len(), 4);
        assert!(!chart.notes.is_empty());
    }
}
