use anyhow::Context;
use clap::Parser;
use media_tidy::{
    clean_transcript, init_tracing, AppConfig, CleanOptions, SpeakerNames, TranscriptSettings,
};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Remove timecode lines, map speaker labels to names and merge
/// consecutive blocks from the same speaker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input transcript text file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name for Speaker 1
    #[arg(long)]
    s1: Option<String>,

    /// Name for Speaker 2
    #[arg(long)]
    s2: Option<String>,

    /// Separator between merged blocks (default: a blank line)
    #[arg(long, allow_hyphen_values = true)]
    sep: Option<String>,

    /// Verbose output on stderr
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        init_tracing();
    }

    // The config file is shared with movie-rename; only read it when a flag
    // falls back to it.
    let settings = if args.s1.is_some() && args.s2.is_some() && args.sep.is_some() {
        TranscriptSettings::default()
    } else {
        AppConfig::load()
            .context("Failed to load the shared media-tidy config file")?
            .transcript
    };
    let options = CleanOptions {
        names: SpeakerNames::new(
            args.s1.unwrap_or(settings.speaker1),
            args.s2.unwrap_or(settings.speaker2),
        ),
        separator: args.sep.unwrap_or(settings.separator),
    };
    debug!(?options, "resolved cleaning options");

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read transcript {}", args.input.display()))?;

    let result = clean_transcript(&raw, &options);

    match &args.output {
        Some(path) => {
            fs::write(path, &result)
                .with_context(|| format!("Failed to write output {}", path.display()))?;
            info!(output = %path.display(), "cleaned transcript written");
        }
        None => print!("{}", result),
    }

    Ok(())
}
