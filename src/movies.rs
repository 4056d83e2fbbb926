//! Movie folder renaming: normalize folder names into search queries, look
//! them up and rename each folder to `"Title (Year)"`.

use crate::{collapse_whitespace, MovieSettings, TidyError};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static SEPARATORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._-]").expect("separator pattern is valid"));
static BRACKETED_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d{4}\)").expect("bracketed year pattern is valid"));
static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+p\b").expect("resolution pattern is valid"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("year pattern is valid"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3,4}\b").expect("number pattern is valid"));

const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Turn a release folder name into a search query.
///
/// `The.Matrix.(1999).1080p` becomes `The Matrix`. Resolution tags are removed
/// before bare years so `1080p` doesn't lose its digits and leave a stray `p`;
/// the older script stripped years first and searched for `The Matrix p`.
pub fn clean_folder_name(folder_name: &str) -> String {
    let name = SEPARATORS_RE.replace_all(folder_name, " ");
    let name = BRACKETED_YEAR_RE.replace_all(&name, "");
    let name = RESOLUTION_RE.replace_all(&name, "");
    let name = YEAR_RE.replace_all(&name, "");
    let name = NUMBER_RE.replace_all(&name, "");
    collapse_whitespace(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieMatch {
    pub title: String,
    pub year: Option<String>,
}

impl MovieMatch {
    /// Build a match from a TMDb style `YYYY-MM-DD` release date.
    pub fn from_release_date(title: impl Into<String>, release_date: Option<&str>) -> Self {
        let year = release_date
            .and_then(|date| date.get(..4))
            .filter(|year| year.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string);

        MovieMatch {
            title: title.into(),
            year,
        }
    }

    /// Canonical folder name, with characters that are invalid in file names
    /// replaced.
    pub fn folder_name(&self) -> String {
        let title: String = self
            .title
            .chars()
            .map(|c| if INVALID_NAME_CHARS.contains(&c) { ' ' } else { c })
            .collect();
        let title = collapse_whitespace(&title);

        match &self.year {
            Some(year) => format!("{} ({})", title, year),
            None => title,
        }
    }
}

/// Finds the best match for a normalized folder name.
#[async_trait]
pub trait MovieLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Option<MovieMatch>, TidyError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    release_date: Option<String>,
}

fn parse_search_response(body: &str) -> Result<Option<MovieMatch>, TidyError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| TidyError::Lookup(format!("Failed to parse TMDb response: {}", e)))?;

    Ok(response
        .results
        .into_iter()
        .next()
        .map(|hit| MovieMatch::from_release_date(hit.title, hit.release_date.as_deref())))
}

/// TMDb v3 movie search client.
pub struct TmdbClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: Option<String>,
}

impl TmdbClient {
    pub fn new(api_key: String, settings: &MovieSettings) -> Result<Self, TidyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.tmdb_endpoint.trim_end_matches('/').to_string(),
            api_key,
            language: settings.language.clone(),
        })
    }
}

#[async_trait]
impl MovieLookup for TmdbClient {
    async fn lookup(&self, query: &str) -> Result<Option<MovieMatch>, TidyError> {
        let mut params = vec![("api_key", self.api_key.as_str()), ("query", query)];
        if let Some(language) = &self.language {
            params.push(("language", language.as_str()));
        }

        debug!(query, "searching TMDb");
        // The request URL carries the API key, keep it out of error messages.
        let response = self
            .client
            .get(format!("{}/search/movie", self.endpoint))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TidyError::Lookup("TMDb request timed out".to_string())
                } else {
                    TidyError::Network(e.without_url())
                }
            })?;

        if !response.status().is_success() {
            return Err(TidyError::Lookup(format!(
                "TMDb API returned error: {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| e.without_url())?;
        parse_search_response(&body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { to: String },
    /// Dry run: the rename that would have happened.
    Planned { to: String },
    Unchanged,
    NoMatch,
    Declined { to: String },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub name: String,
    pub outcome: RenameOutcome,
}

#[derive(Debug, Default)]
pub struct RenameReport {
    pub entries: Vec<RenameEntry>,
}

impl RenameReport {
    pub fn push(&mut self, entry: RenameEntry) {
        self.entries.push(entry);
    }

    pub fn renamed(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                RenameOutcome::Renamed { .. } | RenameOutcome::Planned { .. }
            )
        })
    }

    pub fn unmatched(&self) -> usize {
        self.count(|outcome| matches!(outcome, RenameOutcome::NoMatch))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, RenameOutcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&RenameOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOptions {
    pub dry_run: bool,
}

/// Renames the folders of one directory, one entry at a time.
pub struct Renamer<'a, L: MovieLookup + ?Sized> {
    lookup: &'a L,
    options: RenameOptions,
}

impl<'a, L: MovieLookup + ?Sized> Renamer<'a, L> {
    pub fn new(lookup: &'a L, options: RenameOptions) -> Self {
        Self { lookup, options }
    }

    /// Immediate children of `root`, sorted by name.
    pub fn entries(&self, root: &Path) -> Result<Vec<PathBuf>, TidyError> {
        let mut entries = std::fs::read_dir(root)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        Ok(entries)
    }

    /// Look up and rename a single entry. `confirm` is asked right before the
    /// rename with the old and new folder names; an error from it fails the
    /// entry and leaves the folder alone.
    pub async fn process<C>(&self, path: &Path, confirm: C) -> RenameEntry
    where
        C: FnOnce(&str, &str) -> Result<bool, TidyError>,
    {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let outcome = self.rename_outcome(path, &name, confirm).await;
        RenameEntry { name, outcome }
    }

    async fn rename_outcome<C>(&self, path: &Path, name: &str, confirm: C) -> RenameOutcome
    where
        C: FnOnce(&str, &str) -> Result<bool, TidyError>,
    {
        if name.starts_with('.') || !path.is_dir() {
            debug!(name, "skipping non-directory entry");
            return RenameOutcome::Skipped;
        }

        let query = clean_folder_name(name);
        if query.is_empty() {
            return RenameOutcome::NoMatch;
        }

        let found = match self.lookup.lookup(&query).await {
            Ok(Some(found)) => found,
            Ok(None) => return RenameOutcome::NoMatch,
            Err(e) => {
                warn!(name, error = %e, "lookup failed");
                return RenameOutcome::Failed(e.to_string());
            }
        };

        let target_name = found.folder_name();
        if target_name == name {
            return RenameOutcome::Unchanged;
        }

        let target = path.with_file_name(&target_name);
        if target.exists() {
            return RenameOutcome::Failed(format!("'{}' already exists", target_name));
        }

        match confirm(name, &target_name) {
            Ok(true) => {}
            Ok(false) => return RenameOutcome::Declined { to: target_name },
            Err(e) => {
                warn!(name, error = %e, "confirmation failed");
                return RenameOutcome::Failed(e.to_string());
            }
        }

        if self.options.dry_run {
            return RenameOutcome::Planned { to: target_name };
        }

        match std::fs::rename(path, &target) {
            Ok(()) => {
                info!(from = name, to = %target_name, "renamed folder");
                RenameOutcome::Renamed { to: target_name }
            }
            Err(e) => {
                warn!(name, error = %e, "rename failed");
                RenameOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Rename every movie folder directly under `root` without prompting.
pub async fn scan_and_rename<L: MovieLookup + ?Sized>(
    root: &Path,
    lookup: &L,
    options: RenameOptions,
) -> Result<RenameReport, TidyError> {
    let renamer = Renamer::new(lookup, options);
    let mut report = RenameReport::default();

    for path in renamer.entries(root)? {
        report.push(renamer.process(&path, |_, _| Ok(true)).await);
    }

    Ok(report)
}
