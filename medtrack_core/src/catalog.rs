//! Built-in catalog of medicine pictures.
//!
//! Medicines reference a picture by its catalog id. Only ids and display
//! names live here; the image assets themselves belong to the front end.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// A selectable medicine picture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicinePicture {
    pub id: &'static str,
    pub name: &'static str,
    pub asset: &'static str,
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_PICTURES: Lazy<Vec<MedicinePicture>> = Lazy::new(build_default_pictures);

/// Get a reference to the cached picture catalog
pub fn pictures() -> &'static [MedicinePicture] {
    &DEFAULT_PICTURES
}

/// Look up a picture by id
pub fn find_picture(id: &str) -> Option<&'static MedicinePicture> {
    pictures().iter().find(|p| p.id == id)
}

fn build_default_pictures() -> Vec<MedicinePicture> {
    [
        ("1", "Vitamins", "vitamins.png"),
        ("2", "Syrup", "syrup.png"),
        ("3", "Tablets", "tablets.png"),
        ("4", "Supplement", "supplement.png"),
        ("5", "Pills", "pills.png"),
        ("6", "Pills-2", "pills-2.png"),
        ("7", "Patches", "patches.png"),
        ("8", "Ointment", "ointment.png"),
        ("9", "Injection", "injection.png"),
        ("10", "Inhaler", "inhaler.png"),
        ("11", "Food Supplement", "food-supplement.png"),
        ("12", "Eye Drops", "eye-drops.png"),
        ("13", "Drops", "drops.png"),
        ("14", "Capsule", "capsule.png"),
        ("15", "Capsule-2", "capsule-2.png"),
    ]
    .into_iter()
    .map(|(id, name, asset)| MedicinePicture { id, name, asset })
    .collect()
}

/// Validate a picture catalog
///
/// Returns a list of validation errors (empty if valid).
pub fn validate(pictures: &[MedicinePicture]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for picture in pictures {
        if !seen.insert(picture.id) {
            errors.push(format!("Duplicate picture id '{}'", picture.id));
        }
        if picture.name.trim().is_empty() {
            errors.push(format!("Picture '{}' has an empty name", picture.id));
        }
        if picture.asset.trim().is_empty() {
            errors.push(format!("Picture '{}' has no asset", picture.id));
        }
    }

    errors
}
