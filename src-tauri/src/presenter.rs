use crate::item_store::compare_newest_first;
use crate::record::ScanRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use url::Url;

pub const NO_URL_MESSAGE: &str = "No URL available for this item";
pub const INVALID_URL_MESSAGE: &str = "Invalid URL";
pub const NO_HANDLER_MESSAGE: &str = "No app can handle this URL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    #[default]
    Recent,
    Alphabetical,
    Favorites,
    Renamed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMode {
    pub filter: FilterMode,
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    pub id: String,
    pub text: String,
    pub url: String,
    pub display_date: String,
    pub favorite: bool,
    pub icon_path: Option<String>,
    pub renamed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrompt {
    pub id: String,
    pub text: String,
}

/// Derived ordering over the canonical list. Filtering modes keep the recency
/// order; `reversed` flips the comparison but unparseable timestamps stay at
/// the end either way.
pub fn display_order(records: &[ScanRecord], mode: ListMode) -> Vec<&ScanRecord> {
    let mut visible: Vec<&ScanRecord> = records
        .iter()
        .filter(|record| match mode.filter {
            FilterMode::Favorites => record.favorite,
            FilterMode::Renamed => record.is_renamed(),
            FilterMode::Recent | FilterMode::Alphabetical => true,
        })
        .collect();

    match mode.filter {
        FilterMode::Alphabetical => visible.sort_by(|left, right| {
            let ordering = left.text.to_lowercase().cmp(&right.text.to_lowercase());
            if mode.reversed {
                ordering.reverse()
            } else {
                ordering
            }
        }),
        FilterMode::Recent | FilterMode::Favorites | FilterMode::Renamed => {
            visible.sort_by(|left, right| compare_recency(left, right, mode.reversed))
        }
    }
    visible
}

fn compare_recency(left: &ScanRecord, right: &ScanRecord, reversed: bool) -> Ordering {
    match (left.parsed_timestamp(), right.parsed_timestamp()) {
        (Some(left), Some(right)) if reversed => left.cmp(&right),
        (left, right) => compare_newest_first(left, right),
    }
}

pub fn render_rows(records: &[ScanRecord], mode: ListMode) -> Vec<RecordRow> {
    display_order(records, mode)
        .into_iter()
        .map(|record| RecordRow {
            id: record.id.clone(),
            text: record.text.clone(),
            url: record.url.clone(),
            display_date: record.display_date(),
            favorite: record.favorite,
            icon_path: existing_icon_path(record.icon_path.as_deref()),
            renamed: record.is_renamed(),
        })
        .collect()
}

fn existing_icon_path(icon_path: Option<&str>) -> Option<String> {
    let trimmed = icon_path?.trim();
    if trimmed.is_empty() || !Path::new(trimmed).is_file() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Checks a record URL before it is handed to the system opener. The error is
/// the message shown to the user.
pub fn openable_url(raw: &str) -> Result<Url, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NO_URL_MESSAGE);
    }
    Url::parse(trimmed).map_err(|_| INVALID_URL_MESSAGE)
}

/// Long-press delete flow: at most one record awaits confirmation.
#[derive(Debug, Default)]
pub struct DeleteConfirmation {
    pending: Option<String>,
}

impl DeleteConfirmation {
    pub fn request(&mut self, record: &ScanRecord) -> DeletePrompt {
        self.pending = Some(record.id.clone());
        DeletePrompt {
            id: record.id.clone(),
            text: record.text.clone(),
        }
    }

    /// Returns the id to delete when it matches the pending request.
    pub fn confirm(&mut self, id: &str) -> Option<String> {
        match self.pending.take() {
            Some(pending) if pending == id => Some(pending),
            Some(other) => {
                self.pending = Some(other);
                None
            }
            None => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}
