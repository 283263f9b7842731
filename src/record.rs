//! Data model for one line of a wiktextract/kaikki corpus file.
//!
//! The upstream schema is loose: nearly every field can be missing, scalar
//! fields sometimes arrive as arrays, and editions disagree on where the
//! translation of an example lives. Everything here is `#[serde(default)]`
//! and unknown fields are ignored.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RawRecord {
    pub word: Option<String>,
    pub pos: Option<String>,
    pub etymology_number: Option<u32>,
    pub etymology_text: Option<String>,
    pub sounds: Vec<Sound>,
    pub forms: Vec<FormInfo>,
    pub senses: Vec<RawSense>,
    pub head_templates: Vec<HeadTemplate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HeadTemplate {
    pub name: Option<String>,
    /// Positional template arguments keyed by their index as a string
    /// ("1", "2", ...), the way wiktextract emits them.
    pub args: std::collections::HashMap<String, String>,
    pub expansion: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Sound {
    pub ipa: Option<IpaValue>,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

/// `sounds[].ipa` is a plain string in most editions but an array in some.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum IpaValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FormInfo {
    pub form: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RawSense {
    pub glosses: Option<Glosses>,
    pub raw_glosses: Option<Glosses>,
    pub raw_gloss: Option<Glosses>,
    pub tags: Vec<String>,
    pub raw_tags: Vec<String>,
    pub form_of: Vec<AltForm>,
    pub examples: Vec<RawExample>,
}

/// Gloss fields are a string in old dumps and an array in new ones.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum Glosses {
    One(String),
    Many(Vec<String>),
}

impl Glosses {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Glosses::One(s) => vec![s],
            Glosses::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AltForm {
    pub word: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RawExample {
    pub text: Option<String>,
    pub english: Option<String>,
    pub translation: Option<String>,
}

/// A pronunciation entry after sound normalization.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IpaInfo {
    pub ipa: String,
    pub tags: Vec<String>,
}

/// An example reduced to the two fields the dictionaries carry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub translation: Option<String>,
}

/// A sense with its gloss source flattened to an array and tag fields merged.
#[derive(Debug)]
pub struct TidySense {
    pub glosses: Vec<String>,
    pub tags: Vec<String>,
    pub form_of: Vec<AltForm>,
    pub examples: Vec<Example>,
}

impl RawRecord {
    /// Collect the record's pronunciations. Sounds without an `ipa` value are
    /// skipped; a missing tag list falls back to the free-text note; an array
    /// `ipa` fans out into one entry per transcription.
    pub fn ipa_entries(&self) -> Vec<IpaInfo> {
        let mut entries = Vec::new();
        for sound in &self.sounds {
            let Some(ipa) = &sound.ipa else { continue };
            let tags = if !sound.tags.is_empty() {
                sound.tags.clone()
            } else if let Some(note) = &sound.note {
                vec![note.clone()]
            } else {
                Vec::new()
            };
            match ipa {
                IpaValue::One(s) => {
                    if !s.is_empty() {
                        entries.push(IpaInfo { ipa: s.clone(), tags });
                    }
                }
                IpaValue::Many(list) => {
                    for s in list {
                        if !s.is_empty() {
                            entries.push(IpaInfo { ipa: s.clone(), tags: tags.clone() });
                        }
                    }
                }
            }
        }
        entries
    }

    /// Flatten the record's senses. The effective gloss source is
    /// `raw_glosses ?? raw_gloss ?? glosses`; senses with none are dropped.
    /// `extra_tags` come from head-template inference and apply to every sense.
    pub fn tidy_senses(&self, extra_tags: &[String]) -> Vec<TidySense> {
        self.senses
            .iter()
            .filter_map(|sense| {
                let glosses = sense
                    .raw_glosses
                    .clone()
                    .or_else(|| sense.raw_gloss.clone())
                    .or_else(|| sense.glosses.clone())?
                    .into_vec();
                if glosses.is_empty() {
                    return None;
                }

                let mut tags = sense.tags.clone();
                tags.extend(sense.raw_tags.iter().cloned());
                for tag in extra_tags {
                    if !tags.contains(tag) {
                        tags.push(tag.clone());
                    }
                }

                let examples = sense
                    .examples
                    .iter()
                    .filter_map(standardize_example)
                    .collect();

                Some(TidySense {
                    glosses,
                    tags,
                    form_of: sense.form_of.clone(),
                    examples,
                })
            })
            .collect()
    }
}

fn standardize_example(example: &RawExample) -> Option<Example> {
    let text = example.text.as_deref()?.trim().to_string();
    if text.is_empty() {
        return None;
    }
    let translation = example
        .english
        .clone()
        .or_else(|| example.translation.clone())
        .filter(|t| !t.is_empty());
    Some(Example { text, translation })
}
