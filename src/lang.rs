//! Per-language policy tables.
//!
//! These are closed dispatch tables, not general rules: each entry encodes
//! what one edition of the source data actually does. Extending coverage to
//! a new language means adding a row here, nothing else.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::record::RawRecord;

/// Source languages whose canonical form is known to carry diacritics or
/// vocalization absent from the surface word (Arabic harakat, Latin macrons,
/// Russian stress marks, Ancient Greek breathings).
pub const DIACRITIC_CANONICAL_SOURCES: &[&str] = &["ar", "fa", "la", "ru", "grc"];

/// Source languages where the canonical form is redundant, e.g. it only
/// prepends the definite article.
pub const REDUNDANT_CANONICAL_SOURCES: &[&str] = &["de", "en"];

lazy_static! {
    // Template-call remnants occasionally leak into canonical forms upstream.
    static ref IFEXIST_REMNANT: Regex = Regex::new(r" \{\{#if:.+").unwrap();
    // Trailing bracketed annotation on a canonical form: "fīō [sum]"
    static ref TRAILING_BRACKETS: Regex = Regex::new(r"\[.*\]$").unwrap();
    // Caret markers and spaces inside Japanese reading arguments
    static ref READING_MARKUP: Regex = Regex::new(r"\^| ").unwrap();
    // Tokens in a head-template expansion that map to sense tags
    static ref HEAD_TAG_TOKEN: Regex = Regex::new(r"\b(pf|impf)\b").unwrap();
}

/// Head-template expansion vocabulary, keyed by target language. Matching
/// tokens add the mapped tag to every sense of the record.
const HEAD_TAG_VOCAB: &[(&str, &[(&str, &str)])] =
    &[("en", &[("pf", "perfective"), ("impf", "imperfective")])];

/// Ancient Greek definite articles, stored without diacritics; candidate
/// prefixes are compared after diacritic stripping so both marked and
/// unmarked spellings match.
const GRC_ARTICLES: &[&str] = &[
    "ο", "η", "το", "οι", "αι", "τα", "του", "της", "τω", "τη", "τον", "την",
];

/// Derive the dictionary-key spelling for a record.
pub fn canonical_word(record: &RawRecord, source_iso: &str) -> Option<String> {
    let word = record.word.clone();
    if record.forms.is_empty() {
        return word;
    }

    match source_iso {
        iso if REDUNDANT_CANONICAL_SOURCES.contains(&iso) => word,
        iso if DIACRITIC_CANONICAL_SOURCES.contains(&iso) => canonical_form(word, record),
        // Unlisted codes could go either way; keeps existing behavior.
        _ => canonical_form(word, record),
    }
}

fn canonical_form(word: Option<String>, record: &RawRecord) -> Option<String> {
    let canonical = record.forms.iter().find(|f| {
        f.form.is_some() && f.tags.iter().any(|t| t == "canonical")
    });
    let Some(form) = canonical.and_then(|f| f.form.clone()) else {
        return word;
    };

    let mut form = form;
    if form.contains("{{#ifexist:Wiktionary") {
        form = IFEXIST_REMNANT.replace(&form, "").trim().to_string();
    }
    if TRAILING_BRACKETS.is_match(&form) {
        form = TRAILING_BRACKETS.replace(&form, "").trim().to_string();
    }
    Some(form)
}

/// Reading keys under which a word's senses are filed. Always non-empty.
pub fn readings(word: &str, record: &RawRecord, source_iso: &str) -> Vec<String> {
    match source_iso {
        "fa" => vec![persian_reading(word, record)],
        "ja" => japanese_readings(word, record),
        _ => vec![word.to_string()],
    }
}

/// Persian headwords file under their romanization when one is present as a
/// form tagged only `romanization`.
fn persian_reading(word: &str, record: &RawRecord) -> String {
    record
        .forms
        .iter()
        .find(|f| {
            f.form.is_some() && f.tags.len() == 1 && f.tags[0] == "romanization"
        })
        .and_then(|f| f.form.clone())
        .unwrap_or_else(|| word.to_string())
}

/// Japanese headwords carry their kana reading as a positional argument of
/// the head template. Recognized template names contribute one reading each;
/// unrecognized names are skipped. Happens to be empty on kanji pages and
/// alternative-form entries, which fall back to the word itself.
fn japanese_readings(word: &str, record: &RawRecord) -> Vec<String> {
    let mut result = Vec::new();
    for template in &record.head_templates {
        let reading = match template.name.as_deref() {
            Some("ja-noun") | Some("ja-adj") | Some("ja-verb") | Some("ja-verb form")
            | Some("ja-verb-form") | Some("ja-phrase") => template.args.get("1"),
            Some("ja-pos") => template.args.get("2"),
            Some("head") | Some("ja-def") | Some("ja-syllable") => continue,
            _ => continue,
        };
        if let Some(reading) = reading {
            let cleaned = READING_MARKUP.replace_all(reading, "").to_string();
            if !cleaned.is_empty() && !result.contains(&cleaned) {
                result.push(cleaned);
            }
        }
    }
    if result.is_empty() {
        vec![word.to_string()]
    } else {
        result
    }
}

/// Tags inferred from head-template expansions for the given target language.
pub fn head_template_tags(record: &RawRecord, target_iso: &str) -> Vec<String> {
    let Some((_, vocab)) = HEAD_TAG_VOCAB.iter().find(|(iso, _)| *iso == target_iso) else {
        return Vec::new();
    };
    let mut tags = Vec::new();
    for template in &record.head_templates {
        let Some(expansion) = &template.expansion else { continue };
        for captures in HEAD_TAG_TOKEN.captures_iter(expansion) {
            let token = &captures[1];
            if let Some((_, tag)) = vocab.iter().find(|(t, _)| *t == token) {
                if !tags.contains(&tag.to_string()) {
                    tags.push(tag.to_string());
                }
            }
        }
    }
    tags
}

/// Source-language normalization applied to both members of a
/// (form, lemma) pair before storage.
pub fn normalize_form(source_iso: &str, text: &str) -> String {
    match source_iso {
        "grc" => strip_greek_article(text),
        _ => text.to_string(),
    }
}

/// Remove a leading definite article from an Ancient Greek citation form,
/// matching whether or not the article carries breathing/accent marks.
fn strip_greek_article(text: &str) -> String {
    let Some((first, rest)) = text.split_once(char::is_whitespace) else {
        return text.to_string();
    };
    let bare = strip_diacritics(first).to_lowercase();
    if GRC_ARTICLES.contains(&bare.as_str()) {
        rest.trim_start().to_string()
    } else {
        text.to_string()
    }
}

/// NFD-decompose and drop combining marks.
fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF)
}
