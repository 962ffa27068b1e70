//! Shared data types passed between the catalog scraper, the metadata
//! client, the stores and the enrichment pipeline.

use std::fmt;
use std::path::PathBuf;

/// One scraped catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: String,
    /// `None` when the row's detail link did not carry a record id.
    pub call_number: Option<String>,
}

#[cfg(test)]
impl CatalogEntry {
    pub fn new(title: impl Into<String>, call_number: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            call_number: Some(call_number.into()),
        }
    }
}

/// Fully enriched movie, inserted once per call number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub call_number: String,
    pub title: String,
    pub plot_summary: String,
    pub runtime_minutes: u32,
    pub director: Option<String>,
    /// Relative poster path from the search hit, kept so a later run can
    /// recover a missing poster without another lookup.
    pub poster_path: Option<String>,
}

/// The part of a persisted row the pipeline needs to plan work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub poster_path: Option<String>,
}

/// One candidate from a title search, best match first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDetail {
    pub runtime_minutes: u32,
    pub director: Option<String>,
}

/// Image settings resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub image_base_url: String,
    pub poster_width: String,
}

/// What happened to the poster of an entry that reached the poster step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosterOutcome {
    AlreadyPresent,
    Written(PathBuf),
    Failed(String),
    /// The search hit carried no poster path.
    Unavailable,
}

/// Terminal state of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    SkippedNoCallNumber,
    /// Record and poster were both present; nothing fetched.
    AlreadyComplete,
    SkippedNoResults,
    SkippedLookupFailed(String),
    SkippedStoreWrite(String),
    Enriched {
        record_created: bool,
        poster: PosterOutcome,
    },
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Every scraped entry, including skipped ones.
    pub processed: usize,
    pub already_complete: usize,
    pub records_created: usize,
    pub posters_written: usize,
    pub poster_failures: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        self.processed += 1;
        match outcome {
            EntryOutcome::AlreadyComplete => self.already_complete += 1,
            EntryOutcome::SkippedNoCallNumber
            | EntryOutcome::SkippedNoResults
            | EntryOutcome::SkippedLookupFailed(_)
            | EntryOutcome::SkippedStoreWrite(_) => self.skipped += 1,
            EntryOutcome::Enriched {
                record_created,
                poster,
            } => {
                if *record_created {
                    self.records_created += 1;
                }
                match poster {
                    PosterOutcome::Written(_) => self.posters_written += 1,
                    PosterOutcome::Failed(_) => self.poster_failures += 1,
                    PosterOutcome::AlreadyPresent | PosterOutcome::Unavailable => {}
                }
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} movies processed: created {} records, wrote {} posters ({} poster failures), \
             {} already complete, {} skipped",
            self.processed,
            self.records_created,
            self.posters_written,
            self.poster_failures,
            self.already_complete,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{EntryOutcome, PosterOutcome, RunSummary};

    #[test]
    fn test_summary_counts_every_entry_as_processed() {
        let mut summary = RunSummary::default();
        summary.record(&EntryOutcome::SkippedNoCallNumber);
        summary.record(&EntryOutcome::AlreadyComplete);
        summary.record(&EntryOutcome::Enriched {
            record_created: true,
            poster: PosterOutcome::Written(PathBuf::from("p/b1.jpg")),
        });
        summary.record(&EntryOutcome::Enriched {
            record_created: false,
            poster: PosterOutcome::Failed("boom".to_string()),
        });

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.already_complete, 1);
        assert_eq!(summary.records_created, 1);
        assert_eq!(summary.posters_written, 1);
        assert_eq!(summary.poster_failures, 1);
    }

    #[test]
    fn test_summary_line_leads_with_processed_count() {
        let mut summary = RunSummary::default();
        summary.record(&EntryOutcome::SkippedNoResults);
        summary.record(&EntryOutcome::AlreadyComplete);
        let line = summary.to_string();
        assert!(line.starts_with("2 movies processed:"));
        assert!(line.ends_with("1 already complete, 1 skipped"));
    }
}
