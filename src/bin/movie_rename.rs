use anyhow::{anyhow, bail, Context};
use clap::Parser;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use media_tidy::{
    init_tracing, AppConfig, CredentialManager, RenameEntry, RenameOptions, RenameOutcome,
    RenameReport, Renamer, TidyError, TmdbClient,
};
use std::path::PathBuf;

/// Rename movie folders to "Title (Year)" using TMDb search results.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory containing the movie folders
    #[arg(required_unless_present_any = ["store_key", "forget_key"])]
    dir: Option<String>,

    /// Show what would be renamed without touching anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Ask before each rename
    #[arg(short, long, default_value_t = false)]
    interactive: bool,

    /// TMDb API key for this run
    #[arg(long)]
    api_key: Option<String>,

    /// Prompt for a TMDb API key and store it in the system keyring
    #[arg(long, default_value_t = false, conflicts_with = "forget_key")]
    store_key: bool,

    /// Remove the stored TMDb API key
    #[arg(long, default_value_t = false)]
    forget_key: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        init_tracing();
    }

    if args.interactive && !console::user_attended_stderr() {
        bail!("--interactive needs a terminal to ask for confirmation");
    }

    let credentials = CredentialManager::new();

    if args.store_key {
        let key = rpassword::prompt_password("TMDb API key: ")?;
        if key.trim().is_empty() {
            bail!("No API key entered");
        }
        credentials.set_api_key(key.trim())?;
        println!("{} API key stored in the system keyring", style("✓").green());
        return Ok(());
    }

    if args.forget_key {
        credentials.delete_api_key()?;
        println!("{} Stored API key removed", style("✓").green());
        return Ok(());
    }

    let dir = args
        .dir
        .ok_or_else(|| anyhow!("A movie directory is required"))?;
    let root = PathBuf::from(shellexpand::tilde(&dir).to_string());

    let config = AppConfig::load()?;
    let api_key = match args.api_key {
        Some(key) => key,
        None => credentials.get_api_key()?.ok_or_else(|| {
            anyhow!("TMDb API key not set. Use --api-key, set TMDB_API_KEY, or run: movie-rename --store-key")
        })?,
    };
    let client = TmdbClient::new(api_key, &config.movies)?;

    let renamer = Renamer::new(
        &client,
        RenameOptions {
            dry_run: args.dry_run,
        },
    );
    let entries = renamer
        .entries(&root)
        .with_context(|| format!("Failed to read movie directory {}", root.display()))?;

    if args.dry_run {
        println!("{}", style("Dry run - nothing will be renamed").yellow());
    }

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{pos}/{len}] {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );

    let mut report = RenameReport::default();
    for path in entries {
        progress.set_message(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let entry = renamer
            .process(&path, |from, to| {
                if !args.interactive {
                    return Ok(true);
                }
                progress.suspend(|| {
                    Confirm::new()
                        .with_prompt(format!("Rename '{}' to '{}'?", from, to))
                        .default(true)
                        .interact()
                        .map_err(|e| TidyError::Prompt(e.to_string()))
                })
            })
            .await;

        progress.println(describe(&entry));
        progress.inc(1);
        report.push(entry);
    }
    progress.finish_and_clear();

    println!();
    println!(
        "{} renamed, {} without match, {} failed",
        style(report.renamed()).green(),
        style(report.unmatched()).yellow(),
        style(report.failed()).red()
    );

    Ok(())
}

fn describe(entry: &RenameEntry) -> String {
    let name = &entry.name;
    match &entry.outcome {
        RenameOutcome::Renamed { to } => {
            format!("{} Renamed: '{}' to '{}'", style("✓").green(), name, to)
        }
        RenameOutcome::Planned { to } => {
            format!("{} Would rename: '{}' to '{}'", style("→").cyan(), name, to)
        }
        RenameOutcome::Unchanged => format!("  Already named correctly: '{}'", name),
        RenameOutcome::NoMatch => {
            format!("{} No match found for '{}'", style("?").yellow(), name)
        }
        RenameOutcome::Declined { to } => format!("  Kept '{}' (not renamed to '{}')", name, to),
        RenameOutcome::Skipped => format!("  Skipping file: {}", name),
        RenameOutcome::Failed(reason) => {
            format!("{} Error renaming '{}': {}", style("✗").red(), name, reason)
        }
    }
}
