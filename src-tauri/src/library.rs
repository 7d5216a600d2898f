use crate::error::{AppError, Result};
use crate::favicon::{favicon_file_path, hostname_for};
use crate::item_store::{load_records, save_records};
use crate::preferences::PreferenceStore;
use crate::record::ScanRecord;
use std::path::Path;

/// Identifies the record an icon fetch was started for, and the URL it was
/// started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconTicket {
    pub record_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconApplyOutcome {
    Applied,
    RecordMissing,
    UrlChanged,
}

/// Canonical, persisted list of scans. Order is the load order with new scans
/// prepended; views never reorder it. Every mutation is written through to
/// the preference store before returning.
pub struct ScanLibrary {
    prefs: PreferenceStore,
    records: Vec<ScanRecord>,
}

impl ScanLibrary {
    pub fn open(prefs: PreferenceStore) -> Self {
        let records = load_records(&prefs);
        log::info!("loaded {} stored scans", records.len());
        Self { prefs, records }
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn snapshot(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ScanRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))
    }

    /// Saves `candidate` and only then makes it the live list, so a failed
    /// write leaves memory matching the store.
    fn commit(&mut self, candidate: Vec<ScanRecord>) -> Result<()> {
        save_records(&self.prefs, &candidate).map_err(|err| {
            log::error!("failed to persist scan list: {}", err);
            err
        })?;
        self.records = candidate;
        Ok(())
    }

    pub fn insert(&mut self, record: ScanRecord) -> Result<IconTicket> {
        let ticket = IconTicket {
            record_id: record.id.clone(),
            url: record.url.clone(),
        };
        let mut candidate = Vec::with_capacity(self.records.len() + 1);
        candidate.push(record);
        candidate.extend(self.records.iter().cloned());
        self.commit(candidate)?;
        Ok(ticket)
    }

    /// Returns `false` when the text was already equal and nothing was written.
    pub fn update_text(&mut self, id: &str, text: &str) -> Result<bool> {
        let index = self.position(id)?;
        if self.records[index].text == text {
            return Ok(false);
        }
        let mut candidate = self.records.clone();
        candidate[index].text = text.to_string();
        self.commit(candidate)?;
        Ok(true)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let index = self.position(id)?;
        let mut candidate = self.records.clone();
        let favorite = !candidate[index].favorite;
        candidate[index].favorite = favorite;
        self.commit(candidate)?;
        Ok(favorite)
    }

    pub fn delete(&mut self, id: &str) -> Result<ScanRecord> {
        let index = self.position(id)?;
        let mut candidate = self.records.clone();
        let removed = candidate.remove(index);
        self.commit(candidate)?;
        Ok(removed)
    }

    pub fn icon_in_use(&self, icon_path: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.icon_path.as_deref() == Some(icon_path))
    }

    /// Icon file of a removed record that is safe to delete: no remaining
    /// record points at it, and no record with a fetch still in flight will
    /// be given the same per-host file.
    pub fn orphaned_icon(
        &self,
        removed: &ScanRecord,
        favicons_dir: &Path,
        fetching: impl Fn(&str) -> bool,
    ) -> Option<String> {
        let icon_path = removed.icon_path.clone()?;
        if self.icon_in_use(&icon_path) {
            return None;
        }
        let awaited = self
            .records
            .iter()
            .filter(|record| fetching(&record.id))
            .filter_map(|record| hostname_for(&record.url))
            .any(|hostname| favicon_file_path(favicons_dir, &hostname) == Path::new(&icon_path));
        if awaited {
            None
        } else {
            Some(icon_path)
        }
    }

    pub fn apply_icon(&mut self, ticket: &IconTicket, icon_path: &str) -> Result<IconApplyOutcome> {
        let Ok(index) = self.position(&ticket.record_id) else {
            return Ok(IconApplyOutcome::RecordMissing);
        };
        if self.records[index].url != ticket.url {
            return Ok(IconApplyOutcome::UrlChanged);
        }
        let mut candidate = self.records.clone();
        candidate[index].icon_path = Some(icon_path.to_string());
        self.commit(candidate)?;
        Ok(IconApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{display_order, FilterMode, ListMode};

    fn library_with(payloads: &[&str]) -> ScanLibrary {
        let mut library = ScanLibrary::open(PreferenceStore::open_in_memory().unwrap());
        for payload in payloads {
            library.insert(ScanRecord::from_scan(payload)).unwrap();
        }
        library
    }

    fn reopen(library: ScanLibrary) -> ScanLibrary {
        ScanLibrary::open(library.prefs)
    }

    #[test]
    fn insert_prepends_and_persists() {
        let library = library_with(&["first", "second"]);
        let texts: Vec<&str> = library.snapshot().iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);

        let reopened = reopen(library);
        assert_eq!(reopened.snapshot().len(), 2);
    }

    #[test]
    fn edited_text_persists_while_url_stays() {
        let mut library = library_with(&["https://example.com"]);
        let id = library.snapshot()[0].id.clone();
        assert!(library.update_text(&id, "Example Site").unwrap());
        assert!(!library.update_text(&id, "Example Site").unwrap());

        let reopened = reopen(library);
        let record = reopened.get(&id).unwrap();
        assert_eq!(record.text, "Example Site");
        assert_eq!(record.url, "https://example.com");
    }

    #[test]
    fn edit_through_filtered_view_targets_the_right_record() {
        let mut library = library_with(&["zeta", "alpha", "mid"]);
        let zeta_id = library.snapshot()[2].id.clone();
        library.toggle_favorite(&zeta_id).unwrap();

        let mode = ListMode {
            filter: FilterMode::Favorites,
            reversed: false,
        };
        let visible_id = display_order(library.snapshot(), mode)[0].id.clone();
        assert_eq!(visible_id, zeta_id);

        library.update_text(&visible_id, "renamed zeta").unwrap();
        assert_eq!(library.get(&zeta_id).unwrap().text, "renamed zeta");
        assert_eq!(library.snapshot()[0].text, "mid");
        assert_eq!(library.snapshot()[1].text, "alpha");
    }

    #[test]
    fn toggle_favorite_flips_and_persists() {
        let mut library = library_with(&["a"]);
        let id = library.snapshot()[0].id.clone();
        assert!(library.toggle_favorite(&id).unwrap());
        let mut library = reopen(library);
        assert!(library.get(&id).unwrap().favorite);
        assert!(!library.toggle_favorite(&id).unwrap());
    }

    #[test]
    fn unknown_id_is_reported() {
        let mut library = library_with(&["a"]);
        assert!(matches!(
            library.update_text("missing", "x"),
            Err(AppError::RecordNotFound(_))
        ));
        assert!(matches!(library.delete("missing"), Err(AppError::RecordNotFound(_))));
    }

    #[test]
    fn delete_removes_and_persists() {
        let mut library = library_with(&["a", "b"]);
        let id = library.snapshot()[0].id.clone();
        let removed = library.delete(&id).unwrap();
        assert_eq!(removed.text, "b");
        let reopened = reopen(library);
        assert!(reopened.get(&id).is_none());
        assert_eq!(reopened.snapshot().len(), 1);
    }

    #[test]
    fn icon_applies_only_to_matching_live_record() {
        let mut library = library_with(&["https://example.com", "https://other.org"]);
        let record = library.snapshot()[1].clone();
        let ticket = IconTicket {
            record_id: record.id.clone(),
            url: record.url.clone(),
        };

        let stale = IconTicket {
            record_id: record.id.clone(),
            url: "https://somewhere.else".to_string(),
        };
        assert_eq!(
            library.apply_icon(&stale, "/icons/x.png").unwrap(),
            IconApplyOutcome::UrlChanged
        );
        assert_eq!(library.get(&record.id).unwrap().icon_path, None);

        assert_eq!(
            library.apply_icon(&ticket, "/icons/example.com.png").unwrap(),
            IconApplyOutcome::Applied
        );
        assert!(library.icon_in_use("/icons/example.com.png"));

        library.delete(&record.id).unwrap();
        assert_eq!(
            library.apply_icon(&ticket, "/icons/example.com.png").unwrap(),
            IconApplyOutcome::RecordMissing
        );
        assert!(!library.icon_in_use("/icons/example.com.png"));
    }

    #[test]
    fn shared_icons_are_not_orphaned() {
        let mut library = library_with(&["https://example.com/a", "https://example.com/b"]);
        let ids: Vec<(String, String)> = library
            .snapshot()
            .iter()
            .map(|record| (record.id.clone(), record.url.clone()))
            .collect();
        for (record_id, url) in &ids {
            let ticket = IconTicket {
                record_id: record_id.clone(),
                url: url.clone(),
            };
            library.apply_icon(&ticket, "/icons/example.com.png").unwrap();
        }

        let first = library.delete(&ids[0].0).unwrap();
        assert_eq!(library.orphaned_icon(&first, Path::new("/icons"), |_| false), None);
        let second = library.delete(&ids[1].0).unwrap();
        assert_eq!(
            library
                .orphaned_icon(&second, Path::new("/icons"), |_| false)
                .as_deref(),
            Some("/icons/example.com.png")
        );
    }

    #[test]
    fn icon_awaited_by_a_pending_fetch_is_kept() {
        let mut library = library_with(&["https://example.com/a", "https://example.com/b"]);
        let pending = library.snapshot()[0].clone();
        let done = library.snapshot()[1].clone();
        let ticket = IconTicket {
            record_id: done.id.clone(),
            url: done.url.clone(),
        };
        library.apply_icon(&ticket, "/icons/example.com.png").unwrap();

        let removed = library.delete(&done.id).unwrap();
        let favicons_dir = Path::new("/icons");
        assert_eq!(
            library.orphaned_icon(&removed, favicons_dir, |id| id == pending.id),
            None
        );
        assert_eq!(
            library
                .orphaned_icon(&removed, favicons_dir, |_| false)
                .as_deref(),
            Some("/icons/example.com.png")
        );
    }

    #[test]
    fn failed_save_leaves_the_list_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("qrhub.db");
        let mut library = ScanLibrary::open(PreferenceStore::open(&db_path).unwrap());
        library.insert(ScanRecord::from_scan("https://example.com")).unwrap();
        let record = library.snapshot()[0].clone();
        let before = library.snapshot().to_vec();

        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE preferences")
            .unwrap();

        assert!(matches!(
            library.insert(ScanRecord::from_scan("https://other.org")),
            Err(AppError::Storage(_))
        ));
        assert!(library.update_text(&record.id, "renamed").is_err());
        assert!(library.toggle_favorite(&record.id).is_err());
        assert!(library.delete(&record.id).is_err());
        let ticket = IconTicket {
            record_id: record.id.clone(),
            url: record.url.clone(),
        };
        assert!(library.apply_icon(&ticket, "/icons/example.com.png").is_err());

        assert_eq!(library.snapshot(), before.as_slice());
    }
}
