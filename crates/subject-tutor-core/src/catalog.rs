//! The closed class → subjects mapping offered to users.
//!
//! Selection surfaces only offer keys that appear here; anything else is
//! rejected before a knowledge base is resolved.

use serde::{Deserialize, Serialize};

use crate::models::KbKey;

/// One class and the subjects taught in it, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub class: String,
    pub subjects: Vec<String>,
}

/// Ordered list of classes and their subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    entries: Vec<ClassEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<ClassEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.class.as_str())
    }

    /// Subjects for `class`, or `None` if the class is unknown.
    pub fn subjects(&self, class: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.class == class)
            .map(|e| e.subjects.as_slice())
    }

    pub fn contains(&self, key: &KbKey) -> bool {
        self.subjects(key.class())
            .map(|subjects| subjects.iter().any(|s| s == key.subject()))
            .unwrap_or(false)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        fn entry(class: &str, subjects: &[&str]) -> ClassEntry {
            ClassEntry {
                class: class.to_string(),
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
            }
        }

        let middle = ["Mathematics", "Science", "English"];
        let senior = ["Mathematics", "Physics", "Chemistry", "Biology", "English"];

        Self::new(vec![
            entry("5th", &["Mathematics", "English"]),
            entry("6th", &middle),
            entry("7th", &middle),
            entry("8th", &middle),
            entry(
                "9th",
                &["Mathematics-1", "Mathematics-2", "Science", "English"],
            ),
            entry(
                "10th",
                &[
                    "Mathematics-1",
                    "Mathematics-2",
                    "Science-1",
                    "Science-2",
                    "English",
                ],
            ),
            entry("11th", &senior),
            entry("12th", &senior),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classes_in_order() {
        let catalog = Catalog::default();
        let classes: Vec<&str> = catalog.classes().collect();
        assert_eq!(
            classes,
            vec!["5th", "6th", "7th", "8th", "9th", "10th", "11th", "12th"]
        );
    }

    #[test]
    fn test_subjects_depend_on_class() {
        let catalog = Catalog::default();
        assert_eq!(catalog.subjects("5th").unwrap(), ["Mathematics", "English"]);
        assert!(catalog
            .subjects("10th")
            .unwrap()
            .contains(&"Science-2".to_string()));
        assert!(catalog.subjects("13th").is_none());
    }

    #[test]
    fn test_contains() {
        let catalog = Catalog::default();
        assert!(catalog.contains(&KbKey::new("12th", "Physics")));
        assert!(!catalog.contains(&KbKey::new("5th", "Physics")));
        assert!(!catalog.contains(&KbKey::new("1st", "English")));
    }
}
