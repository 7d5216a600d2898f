use crate::error::Result;
use crate::preferences::PreferenceStore;
use crate::record::ScanRecord;
use std::cmp::Ordering;

pub const PREFS_AREA: &str = "qr_prefs";
pub const KEY_QR_LIST: &str = "qr_list";

/// Reads the stored list, newest first. Absent or unreadable state yields an
/// empty list.
pub fn load_records(prefs: &PreferenceStore) -> Vec<ScanRecord> {
    let json = match prefs.get(PREFS_AREA, KEY_QR_LIST) {
        Ok(Some(json)) => json,
        Ok(None) => return Vec::new(),
        Err(err) => {
            log::error!("failed to read stored scan list: {}", err);
            return Vec::new();
        }
    };

    let mut records: Vec<ScanRecord> = match serde_json::from_str(&json) {
        Ok(records) => records,
        Err(err) => {
            log::warn!("stored scan list is unreadable, starting empty: {}", err);
            return Vec::new();
        }
    };

    sort_newest_first(&mut records);
    records
}

pub fn save_records(prefs: &PreferenceStore, records: &[ScanRecord]) -> Result<()> {
    let json = serde_json::to_string(records)?;
    prefs.put(PREFS_AREA, KEY_QR_LIST, &json)
}

/// Stable; records whose timestamp does not parse go to the end.
pub fn sort_newest_first(records: &mut [ScanRecord]) {
    records.sort_by(|left, right| {
        compare_newest_first(left.parsed_timestamp(), right.parsed_timestamp())
    });
}

pub(crate) fn compare_newest_first<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
