use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M:%S";
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    #[serde(default = "new_record_id")]
    pub id: String,
    pub text: String,
    pub url: String,
    #[serde(rename = "dateTime")]
    pub timestamp: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(rename = "faviconPath", default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

impl ScanRecord {
    pub fn from_scan(payload: &str) -> Self {
        Self::scanned_at(payload, Local::now().naive_local())
    }

    pub fn scanned_at(payload: &str, at: NaiveDateTime) -> Self {
        Self {
            id: new_record_id(),
            text: payload.to_string(),
            url: payload.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            favorite: false,
            icon_path: None,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// `dd/MM/yy` of the timestamp, or whatever precedes the first space when
    /// the stored value does not parse.
    pub fn display_date(&self) -> String {
        match self.parsed_timestamp() {
            Some(parsed) => parsed.format(DISPLAY_DATE_FORMAT).to_string(),
            None => self
                .timestamp
                .split(' ')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn is_renamed(&self) -> bool {
        self.text != self.url
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}
