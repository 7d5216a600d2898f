use crate::error::Result;
use crate::preferences::PreferenceStore;
use crate::presenter::ListMode;
use serde::{Deserialize, Serialize};

pub const SETTINGS_AREA: &str = "app_prefs";
pub const KEY_SETTINGS: &str = "settings";
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme: Theme,
    pub language: String,
    pub list_mode: ListMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            list_mode: ListMode::default(),
        }
    }
}

impl AppSettings {
    pub fn load(prefs: &PreferenceStore) -> Self {
        let stored = match prefs.get(SETTINGS_AREA, KEY_SETTINGS) {
            Ok(stored) => stored,
            Err(err) => {
                log::error!("failed to read settings: {}", err);
                None
            }
        };
        let Some(json) = stored else {
            return Self::default();
        };
        match serde_json::from_str::<AppSettings>(&json) {
            Ok(settings) => settings.normalized(),
            Err(err) => {
                log::warn!("stored settings are unreadable, using defaults: {}", err);
                Self::default()
            }
        }
    }

    pub fn save(&self, prefs: &PreferenceStore) -> Result<()> {
        let json = serde_json::to_string(self)?;
        prefs.put(SETTINGS_AREA, KEY_SETTINGS, &json)
    }

    pub fn normalized(mut self) -> Self {
        self.language = normalize_language(&self.language);
        self
    }
}

pub fn normalize_language(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::FilterMode;

    #[test]
    fn absent_settings_are_defaults() {
        let prefs = PreferenceStore::open_in_memory().unwrap();
        let settings = AppSettings::load(&prefs);
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.language, "en");
        assert_eq!(settings.list_mode.filter, FilterMode::Recent);
    }

    #[test]
    fn settings_round_trip() {
        let prefs = PreferenceStore::open_in_memory().unwrap();
        let settings = AppSettings {
            theme: Theme::Dark,
            language: "ro".to_string(),
            list_mode: ListMode {
                filter: FilterMode::Favorites,
                reversed: true,
            },
        };
        settings.save(&prefs).unwrap();
        assert_eq!(AppSettings::load(&prefs), settings);
    }

    #[test]
    fn corrupted_settings_fall_back_to_defaults() {
        let prefs = PreferenceStore::open_in_memory().unwrap();
        prefs.put(SETTINGS_AREA, KEY_SETTINGS, "{theme: dark").unwrap();
        assert_eq!(AppSettings::load(&prefs), AppSettings::default());
    }

    #[test]
    fn partial_settings_fill_in_missing_fields() {
        let prefs = PreferenceStore::open_in_memory().unwrap();
        prefs
            .put(SETTINGS_AREA, KEY_SETTINGS, r#"{"theme":"dark","language":"  DE "}"#)
            .unwrap();
        let settings = AppSettings::load(&prefs);
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.language, "de");
        assert_eq!(settings.list_mode, ListMode::default());
    }
}
