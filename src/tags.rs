//! Morphological tag tables and description-string utilities.
//!
//! The canonical tag ordering is data, not code: it lives in
//! `schema/tag_order.yaml` and is loaded once at startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::Deserialize;

/// Form tags that mark an entry as templating noise, an error artifact, or a
/// variant we never want in the form index.
pub const BLACKLISTED_TAGS: &[&str] = &[
    "inflection-template",
    "table-tags",
    "canonical",
    "class",
    "error-unknown-tag",
    "error-unrecognized-form",
    "includes-article",
    "obsolete",
    "archaic",
    "used-in-the-form",
    "romanization",
    "dated",
    "auxiliary",
];

/// Tags that describe the lemma itself; a form carrying only these adds no
/// information.
pub const IDENTITY_TAGS: &[&str] = &["nominative", "singular", "infinitive"];

/// Tags removed before the blacklist/identity checks.
pub const REDUNDANT_TAGS: &[&str] = &["multiword-construction", "combined-form"];

const PERSONS: &[&str] = &["first-person", "second-person", "third-person"];

// === Tag order schema ===

#[derive(Debug, Deserialize)]
struct TagOrderSchema {
    tag_categories: Vec<TagCategory>,
}

#[derive(Debug, Deserialize)]
struct TagCategory {
    #[allow(dead_code)]
    name: String,
    tags: Vec<String>,
}

// Global tag-order index loaded from YAML at runtime
static TAG_ORDER: OnceCell<HashMap<String, usize>> = OnceCell::new();

fn load_tag_order(schema_path: &PathBuf) -> Result<HashMap<String, usize>, String> {
    let mut file = File::open(schema_path)
        .map_err(|e| format!("Failed to open tag order schema {:?}: {}", schema_path, e))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| format!("Failed to read tag order schema: {}", e))?;

    let schema: TagOrderSchema = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse tag order YAML: {}", e))?;

    let mut map = HashMap::new();
    for category in schema.tag_categories {
        for tag in category.tags {
            let next = map.len();
            map.entry(tag).or_insert(next);
        }
    }

    Ok(map)
}

pub fn init_tag_order(schema_path: Option<&PathBuf>) -> Result<(), String> {
    if TAG_ORDER.get().is_some() {
        return Ok(());
    }

    let path = if let Some(p) = schema_path {
        p.clone()
    } else {
        let candidates = [
            PathBuf::from("schema/tag_order.yaml"),
            PathBuf::from("../../schema/tag_order.yaml"),
        ];
        candidates
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| "Could not find schema/tag_order.yaml. Use --schema to specify path.".to_string())?
    };

    let map = load_tag_order(&path)?;
    let _ = TAG_ORDER.set(map);
    Ok(())
}

fn get_tag_order() -> &'static HashMap<String, usize> {
    TAG_ORDER.get().expect("tag order not initialized - call init_tag_order() first")
}

/// Sort tags to follow the canonical ordering. Tags missing from the table
/// keep their relative order after all listed tags. Only the English edition
/// has a curated table; other targets pass through unchanged.
pub fn sort_tags(target_iso: &str, tags: &mut Vec<String>) {
    if target_iso != "en" {
        return;
    }
    let order = get_tag_order();
    tags.sort_by_key(|tag| order.get(tag).copied().unwrap_or(usize::MAX));
}

/// Sort inflection description strings so similar ones sit together:
/// primarily by their second word, then word by word, then by length.
pub fn similar_sort(descriptions: &mut Vec<String>) {
    descriptions.sort_by(|a, b| {
        let a_words: Vec<&str> = a.split(' ').collect();
        let b_words: Vec<&str> = b.split(' ').collect();

        let main = a_words.get(1).unwrap_or(&"").cmp(b_words.get(1).unwrap_or(&""));
        if main != std::cmp::Ordering::Equal {
            return main;
        }

        for (aw, bw) in a_words.iter().zip(b_words.iter()) {
            if aw != bw {
                return aw.cmp(bw);
            }
        }

        a_words.len().cmp(&b_words.len())
    });
}

/// Merge description strings whose only difference is the person:
/// `["first-person singular present", "third-person singular present"]`
/// becomes `["first/third-person singular present"]`.
pub fn merge_person_tags(target_iso: &str, descriptions: Vec<String>) -> Vec<String> {
    let has_person = descriptions.iter().any(|d| PERSONS.iter().any(|p| d.contains(p)));
    if descriptions.len() <= 1 || !has_person || target_iso != "en" {
        return descriptions;
    }

    let mut result = Vec::new();
    let mut merge_groups: IndexMap<String, Vec<String>> = IndexMap::new();

    for description in descriptions {
        let all_tags: Vec<&str> = description.split(' ').collect();
        let person_tags: Vec<&str> = all_tags
            .iter()
            .copied()
            .filter(|t| PERSONS.contains(t))
            .collect();

        if person_tags.len() == 1 {
            let other_tags: Vec<&str> = all_tags
                .iter()
                .copied()
                .filter(|t| !PERSONS.contains(t))
                .collect();
            merge_groups
                .entry(other_tags.join("_"))
                .or_default()
                .push(person_tags[0].to_string());
        } else {
            result.push(description);
        }
    }

    for (tag_key, mut person_matches) in merge_groups {
        person_matches.sort_by_key(|p| PERSONS.iter().position(|x| *x == p.as_str()));
        let merged = format!(
            "{}-person",
            person_matches
                .iter()
                .map(|p| p.replace("-person", ""))
                .collect::<Vec<_>>()
                .join("/")
        );

        let mut tags: Vec<String> = tag_key.split('_').map(str::to_string).collect();
        tags.push(merged);
        sort_tags(target_iso, &mut tags);
        result.push(tags.join(" "));
    }

    result
}
