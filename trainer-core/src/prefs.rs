//! # Preference Store Module
//!
//! A small key-value interface for user preferences, injected into the
//! layers that need it instead of being read from ambient globals. The
//! only key the core itself defines is the persisted input-device id.

use std::collections::BTreeMap;

use crate::audio::InputSelection;

/// Fixed key under which the selected input-device id is persisted.
pub const INPUT_DEVICE_KEY: &str = "input-device-id";

/// String-keyed preference storage.
///
/// Implementations persist wherever is appropriate for the host: the GUI
/// backs this with a JSON file, tests with an in-memory map.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn clear(&mut self, key: &str);
}

/// In-process preference store.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> MemoryPreferences {
        MemoryPreferences::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn clear(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Reads the persisted device selection; an absent key means the system
/// default.
pub fn load_input_selection(store: &dyn PreferenceStore) -> InputSelection {
    match store.get(INPUT_DEVICE_KEY) {
        Some(id) => InputSelection::Device(id),
        None => InputSelection::SystemDefault,
    }
}

/// Persists a device selection; reverting to the system default clears
/// the key rather than storing a sentinel id.
pub fn store_input_selection(store: &mut dyn PreferenceStore, selection: &InputSelection) {
    match selection {
        InputSelection::SystemDefault => store.clear(INPUT_DEVICE_KEY),
        InputSelection::Device(id) => store.set(INPUT_DEVICE_KEY, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_roundtrip() {
        let mut store = MemoryPreferences::new();
        assert_eq!(store.get("missing"), None);

        store.set("a", "1");
        assert_eq!(store.get("a").as_deref(), Some("1"));

        store.set("a", "2");
        assert_eq!(store.get("a").as_deref(), Some("2"));

        store.clear("a");
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn absent_device_preference_means_system_default() {
        let store = MemoryPreferences::new();
        assert_eq!(load_input_selection(&store), InputSelection::SystemDefault);
    }

    #[test]
    fn device_selection_roundtrips_and_default_clears() {
        let mut store = MemoryPreferences::new();
        let device = InputSelection::Device("USB Audio Interface".to_string());

        store_input_selection(&mut store, &device);
        assert_eq!(load_input_selection(&store), device);

        store_input_selection(&mut store, &InputSelection::SystemDefault);
        assert_eq!(store.get(INPUT_DEVICE_KEY), None);
        assert_eq!(load_input_selection(&store), InputSelection::SystemDefault);
    }
}
