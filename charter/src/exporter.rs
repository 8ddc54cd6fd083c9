use crate::bpm_mapper::SongSection;
use crate::error::{Error, Result};
use crate::note::{NoteKind, LANE_COUNT};
use crate::{Chart, ChartSource};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChartExport {
    pub title: String,
    pub difficulty: u8,
    pub lanes: u8,
    pub bpm: f32,
    pub duration: f32,
    pub source: ChartSource,
    pub generated_at: i64,
    pub sections: Vec<SongSection>,
    pub notes: Vec<NoteExport>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoteExport {
    pub time: f32,
    pub lane: u8,
    pub kind: NoteKind,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duration: f32,
}

fn is_zero(n: &f32) -> bool {
    *n < 0.001
}

impl ChartExport {
    pub fn new(title: String, difficulty: u8, chart: &Chart) -> Self {
        let generated_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let notes = chart
            .notes
            .iter()
            .map(|n| NoteExport {
                time: n.hit_time,
                lane: n.lane,
                kind: n.kind,
                duration: n.duration,
            })
            .collect();

        ChartExport {
            title,
            difficulty,
            lanes: LANE_COUNT,
            bpm: chart.bpm,
            duration: chart.duration,
            source: chart.source,
            generated_at,
            sections: chart.sections.clone(),
            notes,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Line-based text chart: one `kind|lane|time[|duration]` line per note
    pub fn to_chart(&self) -> String {
        let mut output = String::new();

        // writing to a String cannot fail
        let _ = writeln!(output, "[SONG]");
        let _ = writeln!(output, "  Title = \"{}\"", self.title);
        let _ = writeln!(output, "  BPM = {}", self.bpm);
        let _ = writeln!(output, "  Duration = {:.3}", self.duration);
        let _ = writeln!(output, "  Source = {}", self.source.name());
        output.push('\n');

        let _ = writeln!(output, "[SECTIONS]");
        for section in &self.sections {
            let _ = writeln!(
                output,
                "  {}|{:.3}|{:.3}|{:.2}",
                section.kind, section.start, section.end, section.density
            );
        }
        output.push('\n');

        let _ = writeln!(output, "[NOTES]");
        let _ = writeln!(output, "  Difficulty = {}", self.difficulty);
        let _ = writeln!(output, "  Lanes = {}", self.lanes);
        let _ = writeln!(output, "  Notes = {}", self.notes.len());
        output.push_str(":\n");

        for note in &self.notes {
            if note.kind == NoteKind::Long {
                let _ = writeln!(
                    output,
                    "  {}|{}|{:.3}|{:.3}",
                    note.kind.name(),
                    note.lane,
                    note.time,
                    note.duration
                );
            } else {
                let _ = writeln!(output, "  {}|{}|{:.3}", note.kind.name(), note.lane, note.time);
            }
        }

        output.push_str(";\n");
        output
    }

    pub fn save(&self, path: &Path, format: ChartFormat) -> Result<()> {
        let content = match format {
            ChartFormat::Json => self.to_json()?,
            ChartFormat::Chart => self.to_chart(),
        };

        std::fs::write(path, content)?;
        log::info!("Wrote {} notes to {}", self.notes.len(), path.display());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartFormat {
    Json,
    Chart,
}

impl ChartFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ChartFormat::Json => "json",
            ChartFormat::Chart => "chart",
        }
    }
}

impl FromStr for ChartFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ChartFormat::Json),
            "chart" => Ok(ChartFormat::Chart),
            other => Err(Error::InvalidConfig(format!("unknown chart format: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpm_mapper::default_sections;
    use crate::note::NoteEvent;

    fn chart() -> Chart {
        Chart {
            bpm: 120.0,
            duration: 8.0,
            source: ChartSource::Fallback,
            sections: default_sections(8.0),
            notes: vec![
                NoteEvent::tap(0.5, 2),
                NoteEvent::long(1.0, 1, 0.25),
                NoteEvent::scratch(1.5, 0),
            ],
        }
    }

    #[test]
    fn test_chart_export_json() {
        let export = ChartExport::new("test_song".to_string(), 5, &chart());
        let json = export.to_json().unwrap();
        assert!(json.contains("\"time\": 0.5"));
        assert!(json.contains("\"lane\": 2"));
        assert!(json.contains("\"kind\": \"scratch\""));
        assert!(json.contains("\"source\": \"fallback\""));
        // taps and scratches carry no duration
        assert_eq!(json.matches("\"duration\": 0.25").count(), 1);

        let back: ChartExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, export);
    }

    #[test]
    fn test_chart_export_chart_format() {
        let text = ChartExport::new("test_song".to_string(), 7, &chart()).to_chart();
        assert!(text.contains("BPM = 120"));
        assert!(text.contains("Difficulty = 7"));
        assert!(text.contains("Lanes = 4"));
        assert!(text.contains("Notes = 3"));
        assert!(text.contains("  tap|2|0.500\n"));
        assert!(text.contains("  long|1|1.000|0.250\n"));
        assert!(text.contains("  scratch|0|1.500\n"));
        assert!(text.contains("  drop|3.000|6.000|1.00\n"));
        assert!(text.ends_with(";\n"));
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let export = ChartExport::new("saved".to_string(), 5, &chart());

        let json_path = dir.path().join("song.json");
        export.save(&json_path, ChartFormat::Json).unwrap();
        let back: ChartExport =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back.notes.len(), 3);

        let chart_path = dir.path().join("song.chart");
        export.save(&chart_path, ChartFormat::Chart).unwrap();
        assert!(std::fs::read_to_string(&chart_path).unwrap().starts_with("[SONG]"));
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let export = ChartExport::new("x".to_string(), 5, &chart());
        let err = export
            .save(&dir.path().join("missing/song.json"), ChartFormat::Json)
            .unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }

    #[test]
    fn test_chart_format_detection() {
        assert_eq!("json".parse::<ChartFormat>().unwrap().extension(), "json");
        assert_eq!("CHART".parse::<ChartFormat>().unwrap(), ChartFormat::Chart);
        assert!("invalid".parse::<ChartFormat>().is_err());
    }
}
