//! Nested gloss trees.
//!
//! Senses arriving from the corpus carry their gloss as a path: the first
//! element is the broadest definition, later elements narrow it. All senses
//! of one entry fold into a single tree whose key order is first-occurrence
//! order; that order flows through to the rendered dictionary.
//!
//! Two reserved keys live inside a branch alongside its sub-glosses:
//! `_tags` (top level only, the tags common to every sense sharing that
//! gloss) and `_examples` (attached at the deepest node of a sense's path).

use serde::{Deserialize, Serialize};

use crate::map_json::TaggedMap;
use crate::record::{Example, TidySense};

pub const TAGS_KEY: &str = "_tags";
pub const EXAMPLES_KEY: &str = "_examples";

/// Gloss paths deeper than this are corpus noise; the sense is dropped.
pub const MAX_GLOSS_DEPTH: usize = 16;

pub type GlossBranch = TaggedMap<GlossNode>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlossNode {
    Branch(GlossBranch),
    Tags(Vec<String>),
    Examples(Vec<Example>),
}

#[derive(Debug, PartialEq)]
pub enum GlossTreeError {
    /// Gloss path exceeded MAX_GLOSS_DEPTH levels.
    TooDeep(usize),
    /// A gloss collides with a reserved branch key.
    ReservedGloss(String),
}

impl std::fmt::Display for GlossTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlossTreeError::TooDeep(depth) => {
                write!(f, "gloss path of depth {} exceeds limit {}", depth, MAX_GLOSS_DEPTH)
            }
            GlossTreeError::ReservedGloss(gloss) => {
                write!(f, "gloss collides with reserved key {:?}", gloss)
            }
        }
    }
}

/// Example retention policy. The length ceiling keeps quotation dumps out of
/// popup dictionaries; the per-sense cap is unlimited by default.
#[derive(Debug, Clone)]
pub struct ExampleOptions {
    pub max_length: usize,
    pub max_per_sense: Option<usize>,
}

pub const DEFAULT_EXAMPLE_MAX_LENGTH: usize = 120;

impl Default for ExampleOptions {
    fn default() -> Self {
        ExampleOptions {
            max_length: DEFAULT_EXAMPLE_MAX_LENGTH,
            max_per_sense: None,
        }
    }
}

impl ExampleOptions {
    /// Drop empty and over-length examples, move translation-carrying ones
    /// first (stable, so relative order among ties is preserved), and apply
    /// the per-sense cap.
    pub fn filter(&self, examples: &[Example]) -> Vec<Example> {
        let mut kept: Vec<Example> = examples
            .iter()
            .filter(|e| !e.text.is_empty() && e.text.chars().count() <= self.max_length)
            .cloned()
            .collect();
        kept.sort_by_key(|e| e.translation.is_none());
        if let Some(cap) = self.max_per_sense {
            kept.truncate(cap);
        }
        kept
    }
}

/// Fold one sense into the tree: walk its gloss path from the root, creating
/// branches as needed, maintaining `_tags` at the top level and attaching the
/// sense's examples at the deepest node reached (last writer wins).
pub fn add_sense(
    tree: &mut GlossBranch,
    sense: &TidySense,
    options: &ExampleOptions,
) -> Result<(), GlossTreeError> {
    if sense.glosses.len() > MAX_GLOSS_DEPTH {
        return Err(GlossTreeError::TooDeep(sense.glosses.len()));
    }
    if let Some(bad) = sense
        .glosses
        .iter()
        .find(|g| g.as_str() == TAGS_KEY || g.as_str() == EXAMPLES_KEY)
    {
        return Err(GlossTreeError::ReservedGloss(bad.clone()));
    }

    let mut node = tree;
    for (level_index, gloss) in sense.glosses.iter().enumerate() {
        if !node.contains_key(gloss.as_str()) {
            node.insert(gloss.clone(), GlossNode::Branch(GlossBranch::new()));
            if level_index == 0 {
                if let Some(GlossNode::Branch(branch)) = node.get_mut(gloss.as_str()) {
                    branch.insert(TAGS_KEY.to_string(), GlossNode::Tags(sense.tags.clone()));
                }
            }
        } else if level_index == 0 {
            if let Some(GlossNode::Branch(branch)) = node.get_mut(gloss.as_str()) {
                let previous = match branch.get(TAGS_KEY) {
                    Some(GlossNode::Tags(tags)) => tags.clone(),
                    _ => Vec::new(),
                };
                let intersection: Vec<String> = sense
                    .tags
                    .iter()
                    .filter(|t| previous.contains(t))
                    .cloned()
                    .collect();
                branch.insert(TAGS_KEY.to_string(), GlossNode::Tags(intersection));
            }
        }

        let current = node;
        node = match current.get_mut(gloss.as_str()) {
            Some(GlossNode::Branch(branch)) => branch,
            // Reserved keys are rejected above, so gloss keys always hold branches.
            _ => return Err(GlossTreeError::ReservedGloss(gloss.clone())),
        };
    }

    let examples = options.filter(&sense.examples);
    if !examples.is_empty() {
        node.insert(EXAMPLES_KEY.to_string(), GlossNode::Examples(examples));
    }

    Ok(())
}

/// Sub-glosses of a branch, skipping the reserved keys.
#[allow(dead_code)]
pub fn children(branch: &GlossBranch) -> impl Iterator<Item = (&String, &GlossBranch)> {
    branch.iter().filter_map(|(key, node)| match node {
        GlossNode::Branch(child) if key.as_str() != TAGS_KEY && key.as_str() != EXAMPLES_KEY => {
            Some((key, child))
        }
        _ => None,
    })
}

/// A branch with no sub-glosses is a terminal definition.
#[allow(dead_code)]
pub fn is_leaf(branch: &GlossBranch) -> bool {
    children(branch).next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sense(glosses: &[&str], tags: &[&str]) -> TidySense {
        TidySense {
            glosses: glosses.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            form_of: Vec::new(),
            examples: Vec::new(),
        }
    }

    fn example(text: &str, translation: Option<&str>) -> Example {
        Example {
            text: text.to_string(),
            translation: translation.map(str::to_string),
        }
    }

    #[test]
    fn sibling_glosses_share_a_branch() {
        let mut tree = GlossBranch::new();
        let options = ExampleOptions::default();
        add_sense(&mut tree, &sense(&["animal", "a domesticated canine"], &["zoology", "informal"]), &options).unwrap();
        add_sense(&mut tree, &sense(&["animal", "a wild canine"], &["zoology"]), &options).unwrap();

        assert_eq!(tree.len(), 1);
        let Some(GlossNode::Branch(animal)) = tree.get("animal") else {
            panic!("missing top-level branch");
        };
        let child_keys: Vec<&str> = children(animal).map(|(k, _)| k.as_str()).collect();
        assert_eq!(child_keys, vec!["a domesticated canine", "a wild canine"]);

        // Tags common to both senses survive the intersection
        assert_eq!(
            animal.get(TAGS_KEY),
            Some(&GlossNode::Tags(vec!["zoology".to_string()]))
        );
        for (_, child) in children(animal) {
            assert!(is_leaf(child));
        }
    }

    #[test]
    fn key_order_is_first_occurrence_order() {
        let mut tree = GlossBranch::new();
        let options = ExampleOptions::default();
        add_sense(&mut tree, &sense(&["zebra"], &[]), &options).unwrap();
        add_sense(&mut tree, &sense(&["aardvark"], &[]), &options).unwrap();
        add_sense(&mut tree, &sense(&["zebra", "sub"], &[]), &options).unwrap();

        let keys: Vec<&str> = tree.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zebra", "aardvark"]);
    }

    #[test]
    fn examples_attach_at_deepest_node_and_last_writer_wins() {
        let mut tree = GlossBranch::new();
        let options = ExampleOptions::default();

        let mut first = sense(&["a", "b"], &[]);
        first.examples = vec![example("older", None)];
        add_sense(&mut tree, &first, &options).unwrap();

        let mut second = sense(&["a", "b"], &[]);
        second.examples = vec![example("newer", None)];
        add_sense(&mut tree, &second, &options).unwrap();

        let Some(GlossNode::Branch(a)) = tree.get("a") else { panic!() };
        let Some(GlossNode::Branch(b)) = a.get("b") else { panic!() };
        assert_eq!(
            b.get(EXAMPLES_KEY),
            Some(&GlossNode::Examples(vec![example("newer", None)]))
        );
        // No examples at the intermediate level
        assert!(a.get(EXAMPLES_KEY).is_none());
    }

    #[test]
    fn example_filtering_and_preference() {
        let options = ExampleOptions::default();
        let long_text = "x".repeat(200);
        let examples = vec![
            example("first plain", None),
            example(&long_text, Some("dropped for length")),
            example("has translation", Some("yes")),
            example("second plain", None),
        ];
        let kept = options.filter(&examples);
        assert_eq!(
            kept,
            vec![
                example("has translation", Some("yes")),
                example("first plain", None),
                example("second plain", None),
            ]
        );

        let capped = ExampleOptions { max_per_sense: Some(1), ..Default::default() };
        assert_eq!(capped.filter(&examples).len(), 1);
    }

    #[test]
    fn overly_deep_path_is_rejected() {
        let mut tree = GlossBranch::new();
        let glosses: Vec<String> = (0..MAX_GLOSS_DEPTH + 1).map(|i| format!("level {}", i)).collect();
        let gloss_refs: Vec<&str> = glosses.iter().map(String::as_str).collect();
        let result = add_sense(&mut tree, &sense(&gloss_refs, &[]), &ExampleOptions::default());
        assert_eq!(result, Err(GlossTreeError::TooDeep(MAX_GLOSS_DEPTH + 1)));
        assert!(tree.is_empty());
    }

    #[test]
    fn serialized_shape_uses_tagged_maps() {
        let mut tree = GlossBranch::new();
        add_sense(&mut tree, &sense(&["animal"], &["zoology"]), &ExampleOptions::default()).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r#"{"_type":"map","map":[["animal",{"_type":"map","map":[["_tags",["zoology"]]]}]]}"#
        );

        let revived: GlossBranch = serde_json::from_str(&json).unwrap();
        assert_eq!(revived, tree);
    }
}
