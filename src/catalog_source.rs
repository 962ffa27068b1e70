//! Library inventory scraper.
//!
//! The inventory page is a single HTML table: a header row, then one row per
//! item with the title in bold in the first cell and a catalog detail link
//! ending in `record=<id>` in the third cell.

use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::http_fetch::HttpFetch;
use crate::protocol::CatalogEntry;

pub const DEFAULT_CATALOG_URL: &str =
    "http://library.brown.edu/collatoz/videos.php?task=loc&location=Friedman";
const RECORD_MARKER: &str = "record=";

/// Fetches the inventory page and yields its rows in page order.
pub struct HtmlCatalog<F: HttpFetch> {
    fetcher: F,
    url: String,
}

impl<F: HttpFetch> HtmlCatalog<F> {
    pub fn new(fetcher: F, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    pub fn fetch_entries(&self) -> Result<Vec<CatalogEntry>, String> {
        let html = self
            .fetcher
            .get_text(&self.url)
            .map_err(|error| format!("Couldn't fetch catalog page {}: {error}", self.url))?;
        let entries = parse_catalog_html(&html)?;
        debug!("Scraped {} catalog rows from {}", entries.len(), self.url);
        Ok(entries)
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|error| format!("Invalid selector '{css}': {error}"))
}

/// Extracts the record id from a detail link, e.g. `...?record=b1234567`.
pub fn call_number_from_href(href: &str) -> Option<String> {
    let (_, tail) = href.rsplit_once(RECORD_MARKER)?;
    let tail = tail.trim();
    (!tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .then(|| tail.to_string())
}

fn first_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub fn parse_catalog_html(html: &str) -> Result<Vec<CatalogEntry>, String> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let bold_selector = selector("b")?;
    let link_selector = selector("a")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Err("Catalog page has no table".to_string());
    };

    let mut entries = Vec::new();
    for row in table.select(&row_selector).skip(1) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        let Some(first_cell) = cells.first() else {
            continue;
        };

        let title = first_cell
            .select(&bold_selector)
            .next()
            .map(first_text)
            .unwrap_or_else(|| first_text(*first_cell));
        let call_number = cells
            .get(2)
            .and_then(|cell| cell.select(&link_selector).next())
            .and_then(|link| link.value().attr("href"))
            .and_then(call_number_from_href);

        entries.push(CatalogEntry { title, call_number });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::{call_number_from_href, parse_catalog_html, HtmlCatalog};
    use crate::http_fetch::ScriptedFetcher;
    use crate::protocol::CatalogEntry;

    const PAGE: &str = r#"
        <html><body>
        <table>
          <tr><th>Title</th><th>Call no.</th><th>Link</th></tr>
          <tr>
            <td><b>Arrival</b> (2016)</td><td>DVD 123</td>
            <td><a href="http://josiah.brown.edu/record=b123">Josiah</a></td>
          </tr>
          <tr>
            <td><b> Blade Runner </b></td><td>DVD 9</td>
            <td><a href="http://josiah.brown.edu/search?q=blade">Josiah</a></td>
          </tr>
          <tr>
            <td><b>Stalker</b></td><td>DVD 7</td>
          </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_call_number_from_href_requires_trailing_alphanumeric_id() {
        assert_eq!(
            call_number_from_href("http://josiah.brown.edu/record=b1234567"),
            Some("b1234567".to_string())
        );
        assert_eq!(call_number_from_href("http://x/record=b12/extra"), None);
        assert_eq!(call_number_from_href("http://x/record="), None);
        assert_eq!(call_number_from_href("http://x/search?q=y"), None);
    }

    #[test]
    fn test_parse_catalog_skips_header_and_keeps_rows_without_call_numbers() {
        let entries = parse_catalog_html(PAGE).expect("page parses");
        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("Arrival", "b123"),
                CatalogEntry {
                    title: "Blade Runner".to_string(),
                    call_number: None,
                },
                CatalogEntry {
                    title: "Stalker".to_string(),
                    call_number: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_catalog_without_table_fails() {
        assert!(parse_catalog_html("<html><p>maintenance</p></html>").is_err());
    }

    #[test]
    fn test_fetch_entries_reports_page_failure() {
        let fetcher = ScriptedFetcher::new();
        fetcher.fail("http://catalog/", "transient:Request failed: status code 503");
        let catalog = HtmlCatalog::new(&fetcher, "http://catalog/videos");
        let error = catalog.fetch_entries().expect_err("page unavailable");
        assert!(error.contains("http://catalog/videos"));
    }

    #[test]
    fn test_fetch_entries_parses_fetched_page() {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond_bytes("http://catalog/", PAGE.as_bytes().to_vec());
        let catalog = HtmlCatalog::new(&fetcher, "http://catalog/videos");
        assert_eq!(catalog.fetch_entries().expect("entries").len(), 3);
    }
}
