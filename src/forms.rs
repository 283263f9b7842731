//! The two form indexes and the passes that reconcile them.
//!
//! `FormsMap` is authoritative: every entry came from an explicit inflection
//! gloss. `AutomatedForms` is a heuristic side-channel built from the bare
//! morphological tables on each record; it is consulted only for pairs the
//! explicit data never mentioned, then discarded.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::lang::normalize_form;
use crate::map_json::TaggedMap;
use crate::tags::{
    merge_person_tags, similar_sort, sort_tags, BLACKLISTED_TAGS, IDENTITY_TAGS, REDUNDANT_TAGS,
};

/// pos → inflection descriptions
pub type PosMap = TaggedMap<Vec<String>>;
/// surface form → pos map
pub type FormPointers = TaggedMap<PosMap>;
/// lemma → surface form map
pub type FormsMap = TaggedMap<FormPointers>;

/// lemma → form → pos → tag-description strings
pub type AutomatedForms = IndexMap<String, IndexMap<String, IndexMap<String, Vec<String>>>>;

/// Upper bound on form-of-form chain walks.
pub const MAX_CHAIN_HOPS: usize = 5;

lazy_static! {
    // Leading clitic pronoun fragments on French verb forms
    static ref FRENCH_CLITIC: Regex = Regex::new(r"(qu')?(ils/elles|il/elle/on)\s*").unwrap();
}

/// Record one (form, lemma) pair. Applies language normalization to both
/// members; a pair that collapses onto itself is dropped, never an error.
pub fn add_deinflection(
    forms: &mut FormsMap,
    source_iso: &str,
    target_iso: &str,
    form: &str,
    pos: &str,
    lemma: &str,
    inflections: &[String],
) {
    let mut form = form.to_string();
    if target_iso == "fr" {
        form = FRENCH_CLITIC.replace(&form, "").to_string();
    }
    let form = normalize_form(source_iso, &form);
    let lemma = normalize_form(source_iso, lemma);
    if form == lemma || form.is_empty() || lemma.is_empty() {
        return;
    }

    let descriptions = forms
        .entry(lemma)
        .or_default()
        .entry(form)
        .or_default()
        .entry(pos.to_string())
        .or_default();
    for inflection in inflections {
        if !descriptions.contains(inflection) {
            descriptions.push(inflection.clone());
        }
    }
}

/// Scan a record's morphological table into the automated index.
pub fn process_forms(
    automated: &mut AutomatedForms,
    record_forms: &[crate::record::FormInfo],
    word: &str,
    pos: &str,
    target_iso: &str,
) {
    for form_data in record_forms {
        let Some(form) = form_data.form.as_deref() else { continue };
        if form_data.tags.is_empty() || form == "-" {
            continue;
        }

        let tags: Vec<String> = form_data
            .tags
            .iter()
            .filter(|t| !REDUNDANT_TAGS.contains(&t.as_str()))
            .cloned()
            .collect();
        if tags.iter().any(|t| BLACKLISTED_TAGS.contains(&t.as_str())) {
            continue;
        }
        // Only identity tags left: the form is grammatically the lemma itself.
        if tags.iter().all(|t| IDENTITY_TAGS.contains(&t.as_str())) {
            continue;
        }

        let descriptions = automated
            .entry(word.to_string())
            .or_default()
            .entry(form.to_string())
            .or_default()
            .entry(pos.to_string())
            .or_default();

        let mut sorted = tags;
        sort_tags(target_iso, &mut sorted);
        let description = sorted.join(" ");
        if !descriptions.contains(&description) {
            descriptions.push(description);
        }

        let mut merged = merge_person_tags(target_iso, descriptions.clone());
        similar_sort(&mut merged);
        *descriptions = merged;
    }
}

/// Copy automated entries for (lemma, form) pairs the explicit index never
/// produced. Consumes the automated index as it walks it so peak memory
/// stays bounded on large corpora. Returns the number of populated pairs.
pub fn handle_automated_forms(
    forms: &mut FormsMap,
    automated: AutomatedForms,
    source_iso: &str,
    target_iso: &str,
) -> usize {
    let mut missing = 0;
    for (lemma, form_info) in automated {
        for (form, pos_info) in form_info {
            let already_known = forms
                .get(&lemma)
                .map(|known| known.contains_key(&form))
                .unwrap_or(false);
            if already_known {
                continue;
            }
            missing += 1;
            for (pos, descriptions) in pos_info {
                if form != lemma {
                    add_deinflection(
                        forms,
                        source_iso,
                        target_iso,
                        &form,
                        &pos,
                        &lemma,
                        &descriptions,
                    );
                }
            }
        }
    }
    missing
}

/// Re-point forms whose lemma is itself only a form of something deeper.
///
/// A pair like `fuere → fuera` is useless when `fuere` never received a
/// lemma entry; if `ir → fuere` exists, the original form is re-pointed at
/// `ir` with the chain's descriptions concatenated child-first. Walks are
/// bounded by [`MAX_CHAIN_HOPS`] and a visited set. Returns the number of
/// intermediate lemmas resolved.
pub fn resolve_form_chains(
    forms: &mut FormsMap,
    lemma_keys: &HashSet<String>,
    source_iso: &str,
    target_iso: &str,
) -> usize {
    // Reverse index: surface form → the (lemma, descriptions) pairs it points to
    let mut parents: HashMap<String, Vec<(String, Vec<String>)>> = HashMap::new();
    for (lemma, lemma_forms) in forms.iter() {
        for (form, pos_map) in lemma_forms.iter() {
            let mut merged: Vec<String> = Vec::new();
            for (_pos, descriptions) in pos_map.iter() {
                for d in descriptions {
                    if !merged.contains(d) {
                        merged.push(d.clone());
                    }
                }
            }
            parents
                .entry(form.clone())
                .or_default()
                .push((lemma.clone(), merged));
        }
    }

    let orphans: Vec<String> = forms
        .keys()
        .filter(|lemma| !lemma_keys.contains(*lemma) && parents.contains_key(*lemma))
        .cloned()
        .collect();

    let mut resolved = 0;
    let mut additions: Vec<(String, String, String, Vec<String>)> = Vec::new();

    for orphan in orphans {
        let chains = walk_to_lemmas(&orphan, &parents, lemma_keys);
        if chains.is_empty() {
            continue;
        }
        resolved += 1;

        let Some(orphan_forms) = forms.get(&orphan) else { continue };
        for (form, pos_map) in orphan_forms.iter() {
            for (pos, descriptions) in pos_map.iter() {
                for (ultimate, chain_descriptions) in &chains {
                    let mut combined = descriptions.clone();
                    for d in chain_descriptions {
                        if !combined.contains(d) {
                            combined.push(d.clone());
                        }
                    }
                    additions.push((ultimate.clone(), form.clone(), pos.clone(), combined));
                }
            }
        }
    }

    for (lemma, form, pos, descriptions) in additions {
        add_deinflection(
            forms,
            source_iso,
            target_iso,
            &form,
            &pos,
            &lemma,
            &descriptions,
        );
    }

    resolved
}

/// All real lemmas reachable from `start` through the parent index, with the
/// descriptions collected along each chain (nearest hop first).
fn walk_to_lemmas(
    start: &str,
    parents: &HashMap<String, Vec<(String, Vec<String>)>>,
    lemma_keys: &HashSet<String>,
) -> Vec<(String, Vec<String>)> {
    let mut results: Vec<(String, Vec<String>)> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());

    // (current node, descriptions accumulated so far, hops used)
    let mut queue: Vec<(String, Vec<String>, usize)> = vec![(start.to_string(), Vec::new(), 0)];

    while let Some((current, accumulated, hops)) = queue.pop() {
        if hops >= MAX_CHAIN_HOPS {
            continue;
        }
        let Some(links) = parents.get(&current) else { continue };
        for (parent, descriptions) in links {
            if !visited.insert(parent.clone()) {
                continue;
            }
            let mut chain = accumulated.clone();
            for d in descriptions {
                if !chain.contains(d) {
                    chain.push(d.clone());
                }
            }
            if lemma_keys.contains(parent) {
                if !results.iter().any(|(l, _)| l == parent) {
                    results.push((parent.clone(), chain));
                }
            } else {
                queue.push((parent.clone(), chain, hops + 1));
            }
        }
    }

    results
}
