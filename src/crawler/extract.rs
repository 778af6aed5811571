//! Pulls JSON literals out of inline `<script>` assignments. All knowledge of the site's
//! page markup lives here.

use crate::crawler::error::CrawlerError;
use crate::model::{Board, Settings};
use serde::de::DeserializeOwned;

const SETTINGS_START: &str = r#"app["settings"] = "#;
const SETTINGS_END: &str = r#"app["req"] = "#;
const BOARD_START: &str = r#"app.page["board"] = "#;
const BOARD_END: &str = "app._csr =";

/// Slice between `start` and the last `;` before the first `end` that follows it.
fn embedded_literal<'a>(
    html: &'a str,
    start: &str,
    end: &str,
    what: &'static str,
) -> Result<&'a str, CrawlerError> {
    let missing = |marker: &str| CrawlerError::Extraction {
        what,
        marker: marker.to_string(),
    };
    let start_pos = html.find(start).ok_or_else(|| missing(start))?;
    let body_start = start_pos + start.len();
    let end_pos = html[body_start..]
        .find(end)
        .map(|i| body_start + i)
        .ok_or_else(|| missing(end))?;
    let terminator = html[body_start..end_pos]
        .rfind(';')
        .map(|i| body_start + i)
        .ok_or_else(|| missing(";"))?;
    Ok(html[body_start..terminator].trim())
}

fn extract<T: DeserializeOwned>(
    html: &str,
    start: &str,
    end: &str,
    what: &'static str,
) -> Result<T, CrawlerError> {
    let literal = embedded_literal(html, start, end, what)?;
    serde_json::from_str(literal).map_err(|source| CrawlerError::ExtractionJson { what, source })
}

/// Site settings (`app["settings"] = {...};`) from any full page.
pub fn extract_settings(html: &str) -> Result<Settings, CrawlerError> {
    extract(html, SETTINGS_START, SETTINGS_END, "settings")
}

/// Board payload (`app.page["board"] = {...};`) from a board page.
pub fn extract_board_payload(html: &str) -> Result<Board, CrawlerError> {
    extract(html, BOARD_START, BOARD_END, "board")
}
