use anyhow::{Context, Result};
use beatmap_charter::exporter::{ChartExport, ChartFormat};
use beatmap_charter::{
    AnalysisResult, Chart, Charter, CharterConfig, NoteKind, SongHint, SongInfo, SongSection,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm game chart generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Difficulty from 1 (easiest) to 10
    #[arg(short, long, global = true)]
    difficulty: Option<u8>,

    /// Chart title
    #[arg(short, long, global = true, default_value = "untitled")]
    title: String,

    /// Chart format (json or chart)
    #[arg(long, global = true, default_value = "json")]
    format: String,

    /// Output file, or a directory to write `<title>.<format>` into
    #[arg(short, long, global = true, default_value = ".")]
    output: PathBuf,

    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chart from a saved analysis result
    Smart {
        /// Analysis result JSON
        #[arg(short, long)]
        analysis: PathBuf,

        /// Seed for lane and chord choices (0 = random)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Chart from tempo and song length alone
    Fallback(FallbackArgs),
}

#[derive(Args, Debug)]
struct FallbackArgs {
    #[arg(long)]
    bpm: f32,

    /// Song length in seconds
    #[arg(long)]
    duration: f32,

    /// Seed for note placement (0 = random)
    #[arg(long)]
    seed: Option<u64>,

    /// JSON list of song sections; defaults to intro/build/drop/outro
    #[arg(long)]
    sections: Option<PathBuf>,

    /// Scale note density by --difficulty
    #[arg(long)]
    scaled: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_default_env()
        .filter_level(level.parse()?)
        .init();

    let format: ChartFormat = cli.format.parse()?;
    let mut config = match &cli.config {
        Some(path) => load_json::<CharterConfig>(path)?,
        None => CharterConfig::default(),
    };
    if let Some(difficulty) = cli.difficulty {
        config.mapper.difficulty = difficulty;
    }

    let chart = match &cli.command {
        Command::Smart { analysis, seed } => {
            if let Some(seed) = seed {
                config.mapper.seed = *seed;
            }
            let analysis: AnalysisResult = load_json(analysis)?;
            log::info!(
                "Charting analysis of {:.1}s at {} BPM ({} onsets)",
                analysis.duration,
                analysis.bpm,
                analysis.onsets.len()
            );
            Charter::new(config.clone()).chart_from_analysis(&analysis)
        }
        Command::Fallback(args) => {
            if let Some(seed) = args.seed {
                config.fallback_seed = seed;
            }
            let sections = match &args.sections {
                Some(path) => Some(load_json::<Vec<SongSection>>(path)?),
                None => None,
            };
            let charter = Charter::new(config.clone());

            if args.scaled {
                charter.song_chart(&SongInfo {
                    bpm: args.bpm,
                    duration: args.duration,
                    difficulty: config.mapper.difficulty,
                    sections: sections.unwrap_or_default(),
                })
            } else {
                let hint = SongHint {
                    bpm: Some(args.bpm),
                    duration: Some(args.duration),
                    sections,
                };
                charter.fallback_chart(&hint, args.duration)
            }
        }
    };

    let export = ChartExport::new(cli.title.clone(), config.mapper.difficulty, &chart);
    let output_path = output_path(&cli.output, &cli.title, format);
    export.save(&output_path, format)?;

    log::info!("Saved chart to: {}", output_path.display());
    print_summary(&chart, &export);

    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn output_path(output: &Path, title: &str, format: ChartFormat) -> PathBuf {
    if output.is_dir() {
        let stem: String = title
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        output.join(format!("{}.{}", stem.to_lowercase(), format.extension()))
    } else {
        output.to_path_buf()
    }
}

fn print_summary(chart: &Chart, export: &ChartExport) {
    let count = |kind: NoteKind| chart.notes.iter().filter(|n| n.kind == kind).count();

    println!("\n=== Chart Summary ===");
    println!("{:<10} | {}", "Title", export.title);
    println!("{:<10} | {}", "Source", chart.source.name());
    println!("{:<10} | {}", "BPM", chart.bpm);
    println!("{:<10} | {:.1}s", "Duration", chart.duration);
    println!("{:<10} | {}", "Difficulty", export.difficulty);
    println!(
        "{:<10} | {} notes ({} tap, {} long, {} scratch)",
        "Notes",
        chart.notes.len(),
        count(NoteKind::Tap),
        count(NoteKind::Long),
        count(NoteKind::Scratch)
    );
    for section in &chart.sections {
        println!(
            "{:<10} | {:>7.2}s - {:>7.2}s",
            section.kind.name(),
            section.start,
            section.end
        );
    }
    println!("=== End Summary ===\n");
}
