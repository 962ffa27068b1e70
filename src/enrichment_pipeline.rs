//! Batch enrichment of scraped catalog entries.
//!
//! Each entry is planned from two independent facts, whether a record is
//! already stored and whether its poster file exists, then driven through
//! lookup, insert and poster download. Per-entry failures end as a skipped
//! [`EntryOutcome`]; only store lookup failures abort the run.

use log::{debug, info, warn};

use crate::db_manager::RecordStore;
use crate::http_fetch::HttpFetch;
use crate::metadata_client::MetadataClient;
use crate::poster_store::AssetStore;
use crate::protocol::{
    CatalogEntry, EntryOutcome, MovieRecord, PosterOutcome, RunSummary, SearchHit, ServiceConfig,
    StoredRecord,
};
use crate::rate_limiter::Clock;

/// Work required for one call number given what is already persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPlan {
    /// Record and poster both present.
    Complete,
    /// No record yet: search, fetch detail, insert. Poster only if missing.
    CreateRecord { fetch_poster: bool },
    /// Record present, poster missing. Rows without a stored poster path
    /// need a title search to find one.
    RecoverPoster { stored_poster_path: Option<String> },
}

impl EntryPlan {
    pub fn for_state(record: Option<&StoredRecord>, has_poster: bool) -> Self {
        match (record, has_poster) {
            (Some(_), true) => Self::Complete,
            (Some(record), false) => Self::RecoverPoster {
                stored_poster_path: record.poster_path.clone(),
            },
            (None, has_poster) => Self::CreateRecord {
                fetch_poster: !has_poster,
            },
        }
    }
}

pub struct EnrichmentPipeline<'a, F: HttpFetch, C: Clock> {
    client: MetadataClient<F, C>,
    service: ServiceConfig,
    records: &'a dyn RecordStore,
    posters: &'a dyn AssetStore,
}

impl<'a, F: HttpFetch, C: Clock> EnrichmentPipeline<'a, F, C> {
    /// Loads the service configuration; fails before any entry is touched
    /// when no usable poster width is offered.
    pub fn start(
        mut client: MetadataClient<F, C>,
        records: &'a dyn RecordStore,
        posters: &'a dyn AssetStore,
    ) -> Result<Self, String> {
        let service = client.fetch_service_config()?;
        info!(
            "Service configuration loaded (poster width {}, image base {})",
            service.poster_width, service.image_base_url
        );
        Ok(Self {
            client,
            service,
            records,
            posters,
        })
    }

    /// Processes every entry in order and returns the run totals.
    pub fn run<I>(&mut self, entries: I) -> Result<RunSummary, String>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut summary = RunSummary::default();
        for entry in entries {
            let outcome = self.process_entry(&entry)?;
            debug!("{:?} -> {:?}", entry, outcome);
            summary.record(&outcome);
        }
        Ok(summary)
    }

    pub fn process_entry(&mut self, entry: &CatalogEntry) -> Result<EntryOutcome, String> {
        let Some(call_number) = entry.call_number.as_deref() else {
            warn!("No call number found for {}", entry.title);
            return Ok(EntryOutcome::SkippedNoCallNumber);
        };

        let stored = self.records.find(call_number)?;
        let has_poster = self.posters.exists(call_number);

        let outcome = match EntryPlan::for_state(stored.as_ref(), has_poster) {
            EntryPlan::Complete => {
                debug!("Already have entry and poster for movie {}", entry.title);
                EntryOutcome::AlreadyComplete
            }
            EntryPlan::CreateRecord { fetch_poster } => {
                self.create_record(call_number, &entry.title, fetch_poster)
            }
            EntryPlan::RecoverPoster { stored_poster_path } => {
                let poster_path = match stored_poster_path {
                    Some(path) => Some(path),
                    None => match self.best_match(&entry.title) {
                        Ok(hit) => hit.poster_path,
                        Err(skipped) => return Ok(skipped),
                    },
                };
                let poster =
                    self.download_poster(call_number, &entry.title, poster_path.as_deref());
                EntryOutcome::Enriched {
                    record_created: false,
                    poster,
                }
            }
        };
        Ok(outcome)
    }

    fn best_match(&mut self, title: &str) -> Result<SearchHit, EntryOutcome> {
        let hit = self.client.search_best_match(title).map_err(|error| {
            warn!("Couldn't get search results for {title}: {error}");
            EntryOutcome::SkippedLookupFailed(error)
        })?;
        hit.ok_or_else(|| {
            warn!("No results found for \"{title}\"");
            EntryOutcome::SkippedNoResults
        })
    }

    fn create_record(
        &mut self,
        call_number: &str,
        title: &str,
        fetch_poster: bool,
    ) -> EntryOutcome {
        let hit = match self.best_match(title) {
            Ok(hit) => hit,
            Err(skipped) => return skipped,
        };

        let detail = match self.client.fetch_movie_detail(hit.id) {
            Ok(detail) => detail,
            Err(error) => {
                warn!("Couldn't get details for {}: {error}", hit.title);
                return EntryOutcome::SkippedLookupFailed(error);
            }
        };

        let record = MovieRecord {
            call_number: call_number.to_string(),
            title: hit.title,
            plot_summary: hit.overview,
            runtime_minutes: detail.runtime_minutes,
            director: detail.director,
            poster_path: hit.poster_path,
        };
        info!("Creating record for {}...", record.title);
        if let Err(error) = self.records.insert(&record) {
            warn!("Couldn't store record for {}: {error}", record.title);
            return EntryOutcome::SkippedStoreWrite(error);
        }

        let poster = if fetch_poster {
            self.download_poster(call_number, title, record.poster_path.as_deref())
        } else {
            PosterOutcome::AlreadyPresent
        };
        EntryOutcome::Enriched {
            record_created: true,
            poster,
        }
    }

    fn download_poster(
        &self,
        call_number: &str,
        title: &str,
        poster_path: Option<&str>,
    ) -> PosterOutcome {
        let Some(poster_path) = poster_path else {
            warn!("No poster available for {title}");
            return PosterOutcome::Unavailable;
        };

        let url = self.service.poster_url(poster_path);
        info!("\tDownloading poster for {title}");
        let written = self
            .client
            .fetch_asset(&url)
            .and_then(|bytes| self.posters.write(call_number, &bytes));
        match written {
            Ok(path) => PosterOutcome::Written(path),
            Err(error) => {
                warn!("Couldn't download poster for {title} from {url}: {error}");
                PosterOutcome::Failed(error)
            }
        }
    }
}
