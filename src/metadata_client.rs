//! Paced client for the movie database API.
//!
//! Every request carries the API credential and is counted against the
//! sliding-window limiter. When the limiter reports pressure the client
//! sleeps one full window and then issues the request anyway.

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::http_fetch::{request_url, FailureKind, HttpFetch};
use crate::protocol::{MovieDetail, SearchHit, ServiceConfig};
use crate::rate_limiter::{Clock, RateLimiter};

pub const DEFAULT_API_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const PREFERRED_POSTER_WIDTHS: [&str; 4] = ["w342", "w500", "w780", "original"];
/// Size segment spliced into every poster URL regardless of the selected width.
pub const POSTER_URL_SIZE_SEGMENT: &str = "w300";
const API_KEY_PARAM: &str = "api_key";
const DIRECTOR_JOB: &str = "Director";

/// Picks the first preferred width the service offers.
pub fn select_poster_width(available: &[String]) -> Option<&'static str> {
    PREFERRED_POSTER_WIDTHS
        .into_iter()
        .find(|preferred| available.iter().any(|size| size == preferred))
}

impl ServiceConfig {
    /// `{image_base_url}w300{poster_path}`
    pub fn poster_url(&self, poster_path: &str) -> String {
        format!(
            "{}{}{}",
            self.image_base_url, POSTER_URL_SIZE_SEGMENT, poster_path
        )
    }
}

pub struct MetadataClient<F: HttpFetch, C: Clock> {
    fetcher: F,
    limiter: RateLimiter<C>,
    api_key: String,
    base_url: String,
}

impl<F: HttpFetch, C: Clock> MetadataClient<F, C> {
    pub fn new(
        fetcher: F,
        limiter: RateLimiter<C>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Issues one paced GET against `{base}{endpoint}` with the credential merged in.
    pub fn call(&mut self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, String> {
        if let Some((key, _)) = params.iter().find(|(key, _)| *key == API_KEY_PARAM) {
            return Err(format!(
                "Parameter '{key}' collides with the API credential for {endpoint}"
            ));
        }

        let mut merged: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        merged.push((API_KEY_PARAM, self.api_key.as_str()));
        merged.extend_from_slice(params);
        let url = request_url(&self.base_url, endpoint, &merged);

        if self.limiter.bump() {
            let window = self.limiter.window();
            info!(
                "API rate limit reached ({} requests in window), pausing {:?}",
                self.limiter.total(),
                window
            );
            self.limiter.clock().sleep(window);
        }

        debug!("GET {}{}", self.base_url, endpoint);
        self.fetcher.get_json(&url).map_err(|failure| {
            match FailureKind::of(&failure) {
                Some(FailureKind::Throttled) => warn!(
                    "Service rejected {endpoint} as over its rate limit; \
                     rate_limit_requests may be set too high"
                ),
                Some(FailureKind::Transient) => {
                    warn!("Transient failure calling {endpoint}; a later run will retry")
                }
                _ => {}
            }
            failure
        })
    }

    /// Downloads a binary asset (poster art). Asset hosts are not paced.
    pub fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, String> {
        let bytes = self.fetcher.get_bytes(url)?;
        if bytes.is_empty() {
            return Err(format!("Empty response body from {url}"));
        }
        Ok(bytes)
    }

    /// Loads the image configuration and selects a poster width.
    pub fn fetch_service_config(&mut self) -> Result<ServiceConfig, String> {
        let payload = self
            .call("/configuration", &[])
            .map_err(|error| format!("Couldn't load service configuration: {error}"))?;
        let images = payload
            .get("images")
            .ok_or_else(|| "Service configuration is missing 'images'".to_string())?;
        let image_base_url = images
            .get("base_url")
            .and_then(Value::as_str)
            .ok_or_else(|| "Service configuration is missing 'images.base_url'".to_string())?
            .to_string();
        let poster_sizes: Vec<String> = images
            .get("poster_sizes")
            .and_then(Value::as_array)
            .ok_or_else(|| "Service configuration is missing 'images.poster_sizes'".to_string())?
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect();

        let Some(poster_width) = select_poster_width(&poster_sizes) else {
            error!("No preferred poster width found. Options are:");
            for size in &poster_sizes {
                error!("- {size}");
            }
            return Err(format!(
                "No preferred poster width found (wanted one of {}; service offers {})",
                PREFERRED_POSTER_WIDTHS.join(", "),
                poster_sizes.join(", ")
            ));
        };

        Ok(ServiceConfig {
            image_base_url,
            poster_width: poster_width.to_string(),
        })
    }

    /// Title search reduced to the service's top-ranked hit; `None` means
    /// the service found nothing.
    pub fn search_best_match(&mut self, title: &str) -> Result<Option<SearchHit>, String> {
        let payload = self.call("/search/movie", &[("query", title)])?;
        parse_search_payload(&payload)
    }

    /// Extended detail with the credits sub-resource appended.
    pub fn fetch_movie_detail(&mut self, movie_id: i64) -> Result<MovieDetail, String> {
        let endpoint = format!("/movie/{movie_id}");
        let payload = self.call(&endpoint, &[("append_to_response", "credits")])?;
        parse_detail_payload(&payload)
    }
}

// Only the first result is parsed; lower-ranked entries are never used.
fn parse_search_payload(payload: &Value) -> Result<Option<SearchHit>, String> {
    let total_results = payload
        .get("total_results")
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("Search response has no 'total_results': {payload}"))?;
    if total_results == 0 {
        return Ok(None);
    }

    payload
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| "Search response has no 'results' list".to_string())?
        .first()
        .map(parse_search_hit)
        .transpose()
}

fn parse_search_hit(item: &Value) -> Result<SearchHit, String> {
    let id = item
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| "Search result is missing 'id'".to_string())?;
    let title = item
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Search result {id} is missing 'title'"))?
        .to_string();
    let overview = item
        .get("overview")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let poster_path = item
        .get("poster_path")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(ToOwned::to_owned);
    Ok(SearchHit {
        id,
        title,
        overview,
        poster_path,
    })
}

fn parse_runtime(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|minutes| *minutes >= 0.0).map(|minutes| minutes as u64))
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        .and_then(|minutes| u32::try_from(minutes).ok())
}

fn parse_detail_payload(payload: &Value) -> Result<MovieDetail, String> {
    let runtime_minutes = payload
        .get("runtime")
        .and_then(parse_runtime)
        .ok_or_else(|| "Detail response has no usable 'runtime'".to_string())?;
    let director = payload
        .get("credits")
        .and_then(|credits| credits.get("crew"))
        .and_then(Value::as_array)
        .and_then(|crew| {
            crew.iter()
                .find(|person| person.get("job").and_then(Value::as_str) == Some(DIRECTOR_JOB))
        })
        .and_then(|person| person.get("name").and_then(Value::as_str))
        .map(ToOwned::to_owned);
    Ok(MovieDetail {
        runtime_minutes,
        director,
    })
}
