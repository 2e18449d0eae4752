// ==========================================
// TRACK CATALOG
// ==========================================
// The fixed list of ambient tracks the user can pick from.
//
// A catalog is built once at startup and never changes afterwards.
// Insertion order is display order, and a track's name is its identity,
// so names must be unique.
//
// Each entry maps a human-readable name ("Train car") to a resource key
// the decoder knows how to open (a path such as "assets/train-car.wav").

use std::collections::HashSet;
use std::path::Path;

use super::error::{CatalogError, PlaybackError};

// Recordings shipped with the player, with the attribution each one needs.
// Sounds are from https://freesound.org/
const BUILTIN_TRACKS: &[(&str, &str)] = &[
    (
        "Rain",
        "Rain_Storm.wav by rambler52, https://freesound.org/s/332116/, License: Attribution 4.0",
    ),
    (
        "Forest",
        "forest summer Roond 005 200619_0186.wav by klankbeeld, https://freesound.org/s/524238/, License: Attribution 4.0",
    ),
    (
        "Train car",
        "Empty train moving slowly (recorded inside passenger car) by avakas, https://freesound.org/s/197124/, License: Creative Commons 0",
    ),
    (
        "Horse carriage",
        "Canadian Horse Carriage.wav by vero.marengere, https://freesound.org/s/450325/, License: Attribution NonCommercial 4.0",
    ),
];

// ==========================================
// TRACK ENTRY
// ==========================================
// One selectable track.
//
// name:         what the user sees, and the catalog's lookup key
// resource_key: what the decoder opens
// credit:       optional attribution line, rendered as the item description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub name: String,
    pub resource_key: String,
    pub credit: Option<String>,
}

impl TrackEntry {
    pub fn new(name: impl Into<String>, resource_key: impl Into<String>) -> Self {
        TrackEntry {
            name: name.into(),
            resource_key: resource_key.into(),
            credit: None,
        }
    }

    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.credit = Some(credit.into());
        self
    }
}

// ==========================================
// CATALOG
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TrackEntry>,
}

impl Catalog {
    // Builds a catalog, rejecting empty or duplicate names.
    pub fn new(entries: Vec<TrackEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(CatalogError::DuplicateTrack(entry.name.clone()));
            }
        }

        Ok(Catalog { entries })
    }

    // The shipped track set, with every resource resolved against assets_dir.
    pub fn builtin(assets_dir: &Path) -> Self {
        let entries = BUILTIN_TRACKS
            .iter()
            .map(|(name, credit)| {
                TrackEntry::new(*name, default_resource_key(assets_dir, name))
                    .with_credit(*credit)
            })
            .collect();

        // The builtin names are distinct, so there is nothing to validate
        Catalog { entries }
    }

    // Name -> resource key. Deterministic; fails only for unknown names.
    pub fn resolve(&self, name: &str) -> Result<&str, PlaybackError> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.resource_key.as_str())
            .ok_or_else(|| PlaybackError::UnknownTrack(name.to_string()))
    }

    pub fn get(&self, index: usize) -> Option<&TrackEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// "Train car" -> "train-car.wav"
pub fn asset_file_name(name: &str) -> String {
    format!("{}.wav", name.to_lowercase().replace(' ', "-"))
}

pub fn default_resource_key(assets_dir: &Path, name: &str) -> String {
    assets_dir
        .join(asset_file_name(name))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn builtin_catalog_keeps_display_order() {
        let catalog = Catalog::builtin(Path::new("assets"));
        let names: Vec<&str> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Rain", "Forest", "Train car", "Horse carriage"]);
        assert!(catalog.entries().iter().all(|e| e.credit.is_some()));
    }

    #[test]
    fn resolve_maps_names_to_snake_cased_files() {
        let catalog = Catalog::builtin(Path::new("assets"));
        let expected: String = PathBuf::from("assets")
            .join("horse-carriage.wav")
            .to_string_lossy()
            .into_owned();
        assert_eq!(catalog.resolve("Horse carriage").unwrap(), expected);
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let catalog = Catalog::builtin(Path::new("assets"));
        assert_eq!(
            catalog.resolve("Thunder"),
            Err(PlaybackError::UnknownTrack("Thunder".to_string()))
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Catalog::new(vec![
            TrackEntry::new("Rain", "a.wav"),
            TrackEntry::new("Rain", "b.wav"),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateTrack("Rain".into()));
    }

    #[test]
    fn empty_names_are_rejected() {
        let result = Catalog::new(vec![TrackEntry::new("  ", "a.wav")]);
        assert_eq!(result.unwrap_err(), CatalogError::EmptyName);
    }

    #[test]
    fn empty_catalog_is_allowed() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.get(0).is_none());
    }
}
