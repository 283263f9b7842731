//! The tidy-up session: one pass over the corpus, two dictionaries out.
//!
//! All accumulator state is owned here and threaded explicitly through the
//! stage functions; there are no ambient globals. Records are folded in one
//! at a time, so none of the maps ever sees concurrent access. The
//! post-stream passes (automated-form fallback, chain resolution, chunked
//! serialization) each consume their input map as they walk it; on corpora
//! of millions of lines that drain-as-you-go pattern is what keeps peak
//! memory flat, not a nicety.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::forms::{
    add_deinflection, handle_automated_forms, process_forms, resolve_form_chains, AutomatedForms,
    FormsMap,
};
use crate::glosstree::{add_sense, ExampleOptions, GlossBranch};
use crate::inflection::{extract_inflections, is_inflection_gloss};
use crate::lang::{canonical_word, head_template_tags, readings};
use crate::record::{IpaInfo, RawRecord};

lazy_static! {
    static ref PARENTHESIZED: Regex = Regex::new(r"\(.+\)").unwrap();
}

#[derive(Debug, Clone)]
pub struct TidyConfig {
    pub source_iso: String,
    pub target_iso: String,
    pub examples: ExampleOptions,
    /// Lemma keys per form dictionary chunk file.
    pub chunk_size: usize,
    /// Recover from malformed JSON lines instead of aborting.
    pub skip_malformed: bool,
    /// Re-point form-of-form chains at their ultimate lemma.
    pub resolve_chains: bool,
    pub quiet: bool,
}

impl TidyConfig {
    pub fn new(source_iso: &str, target_iso: &str) -> Self {
        TidyConfig {
            source_iso: source_iso.to_string(),
            target_iso: target_iso.to_string(),
            examples: ExampleOptions::default(),
            chunk_size: 10_000,
            skip_malformed: false,
            resolve_chains: true,
            quiet: true,
        }
    }
}

/// One homograph entry in the lemma dictionary.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LemmaInfo {
    pub ipa: Vec<IpaInfo>,
    #[serde(rename = "glossTree")]
    pub gloss_tree: GlossBranch,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub etymology_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub morpheme_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub head_info_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub backlink: Option<String>,
}

/// word → reading → pos → etymology slot → entry. The slot level is ordered
/// numerically; the outer levels keep insertion order.
pub type LemmaDict = IndexMap<String, IndexMap<String, IndexMap<String, BTreeMap<u32, LemmaInfo>>>>;

#[derive(Debug, Default)]
pub struct RunStats {
    pub lines: usize,
    pub malformed_lines: usize,
    pub inflection_senses: usize,
    pub ambiguous_senses_dropped: usize,
    pub glosses_dropped: usize,
    pub lemma_words: usize,
    pub form_lemmas: usize,
    pub missing_forms_populated: usize,
    pub chains_resolved: usize,
    pub form_chunks_written: usize,
}

pub struct TidySession {
    config: TidyConfig,
    lemma_dict: LemmaDict,
    forms: FormsMap,
    automated: AutomatedForms,
    stats: RunStats,
}

impl TidySession {
    pub fn new(config: TidyConfig) -> Self {
        TidySession {
            config,
            lemma_dict: LemmaDict::default(),
            forms: FormsMap::new(),
            automated: AutomatedForms::new(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Fold one corpus line into the session. A malformed line is fatal
    /// unless the session was configured to skip them.
    pub fn process_line(&mut self, line: &str) -> io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        self.stats.lines += 1;

        let record: RawRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                if self.config.skip_malformed {
                    self.stats.malformed_lines += 1;
                    self.warn(&format!("skipping malformed line {}: {}", self.stats.lines, e));
                    return Ok(());
                }
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed JSON on line {}: {}", self.stats.lines, e),
                ));
            }
        };

        self.handle_record(record);
        Ok(())
    }

    fn handle_record(&mut self, record: RawRecord) {
        let Some(pos) = record.pos.clone() else { return };
        let Some(word) = canonical_word(&record, &self.config.source_iso) else { return };
        if word.is_empty() {
            return;
        }

        // The collector sees every record, whether or not its senses survive.
        process_forms(
            &mut self.automated,
            &record.forms,
            &word,
            &pos,
            &self.config.target_iso,
        );

        if record.senses.is_empty() {
            return;
        }

        let extra_tags = head_template_tags(&record, &self.config.target_iso);
        let senses = record.tidy_senses(&extra_tags);

        let mut primary_senses = Vec::new();
        for sense in senses {
            if !is_inflection_gloss(&self.config.target_iso, &sense.glosses, &sense.form_of) {
                primary_senses.push(sense);
                continue;
            }
            self.stats.inflection_senses += 1;
            match extract_inflections(
                &self.config.target_iso,
                &sense.glosses,
                &sense.form_of,
                &word,
                &pos,
            ) {
                Ok(deinflections) => {
                    for d in deinflections {
                        add_deinflection(
                            &mut self.forms,
                            &self.config.source_iso,
                            &self.config.target_iso,
                            &d.form,
                            &pos,
                            &d.lemma,
                            &d.inflections,
                        );
                    }
                }
                Err(ambiguous) => {
                    self.stats.ambiguous_senses_dropped += 1;
                    self.warn(&format!(
                        "multiple lemmas in inflection glosses for '{}': {:?}",
                        word, ambiguous.lemmas
                    ));
                }
            }
        }

        if primary_senses.is_empty() {
            return;
        }

        let mut tree = GlossBranch::new();
        for sense in &primary_senses {
            if let Err(e) = add_sense(&mut tree, sense, &self.config.examples) {
                self.stats.glosses_dropped += 1;
                self.warn(&format!("dropping sense of '{}': {}", word, e));
            }
        }
        if tree.is_empty() {
            return;
        }

        let ipa = record.ipa_entries();
        let backlink = format!(
            "https://{}.wiktionary.org/wiki/{}",
            self.config.target_iso, word
        );

        for reading in readings(&word, &record, &self.config.source_iso) {
            let entry = next_free_entry(
                &mut self.lemma_dict,
                &word,
                &reading,
                &pos,
                record.etymology_number,
            );

            for ipa_info in &ipa {
                merge_ipa(entry, ipa_info);
            }

            if entry.etymology_text.is_none() {
                entry.etymology_text = record.etymology_text.clone();
                entry.morpheme_text = record
                    .etymology_text
                    .as_deref()
                    .and_then(morpheme_text);
            }
            if entry.head_info_text.is_none() {
                entry.head_info_text = record
                    .head_templates
                    .iter()
                    .find_map(|t| t.expansion.clone().filter(|e| PARENTHESIZED.is_match(e)));
            }
            if entry.backlink.is_none() {
                entry.backlink = Some(backlink.clone());
            }

            entry.gloss_tree = tree.clone();
        }
    }

    /// Run the post-stream passes and serialize both dictionaries.
    pub fn finalize_and_write(&mut self, tidy_folder: &Path) -> io::Result<()> {
        fs::create_dir_all(tidy_folder)?;
        self.remove_stale_outputs(tidy_folder)?;

        let spinner = self.phase_spinner();
        let pair = format!("{}-{}", self.config.source_iso, self.config.target_iso);

        // 1. Lemma dictionary, then drop it: everything later needs only the
        //    key set.
        let lemmas_path = tidy_folder.join(format!("{}-lemmas.json", pair));
        spinner.set_message(format!("Writing lemma dict to {}...", lemmas_path.display()));
        self.stats.lemma_words = self.lemma_dict.len();
        let lemma_keys: HashSet<String> = self.lemma_dict.keys().cloned().collect();
        {
            let file = fs::File::create(&lemmas_path)?;
            let mut writer = BufWriter::with_capacity(256 * 1024, file);
            serde_json::to_writer(&mut writer, &self.lemma_dict)?;
            writer.flush()?;
        }
        self.lemma_dict = LemmaDict::default();

        // 2. Fallback pass over the automated index (consumed as it walks).
        spinner.set_message("Handling automated forms...");
        let automated = std::mem::take(&mut self.automated);
        self.stats.missing_forms_populated = handle_automated_forms(
            &mut self.forms,
            automated,
            &self.config.source_iso,
            &self.config.target_iso,
        );

        // 3. Optional multi-hop resolution.
        if self.config.resolve_chains {
            spinner.set_message("Resolving form chains...");
            self.stats.chains_resolved = resolve_form_chains(
                &mut self.forms,
                &lemma_keys,
                &self.config.source_iso,
                &self.config.target_iso,
            );
        }

        // 4. Chunked form dictionary, draining the map chunk by chunk.
        self.stats.form_lemmas = self.forms.len();
        let forms = std::mem::take(&mut self.forms);
        let mut chunk: FormsMap = FormsMap::new();
        let mut chunk_index = 0;
        for (lemma, lemma_forms) in forms.0 {
            chunk.insert(lemma, lemma_forms);
            if chunk.len() >= self.config.chunk_size {
                self.write_form_chunk(tidy_folder, &pair, chunk_index, &chunk, &spinner)?;
                chunk = FormsMap::new();
                chunk_index += 1;
            }
        }
        // Chunk 0 is always written, even when empty.
        if !chunk.is_empty() || chunk_index == 0 {
            self.write_form_chunk(tidy_folder, &pair, chunk_index, &chunk, &spinner)?;
            chunk_index += 1;
        }
        self.stats.form_chunks_written = chunk_index;

        spinner.finish_and_clear();
        if !self.config.quiet {
            println!(
                "There were {} missing forms that have now been automatically populated.",
                self.stats.missing_forms_populated
            );
        }
        Ok(())
    }

    fn write_form_chunk(
        &self,
        tidy_folder: &Path,
        pair: &str,
        index: usize,
        chunk: &FormsMap,
        spinner: &ProgressBar,
    ) -> io::Result<()> {
        let path = tidy_folder.join(format!("{}-forms-{}.json", pair, index));
        spinner.set_message(format!("Writing form dict {} to {}...", index, path.display()));
        let file = fs::File::create(&path)?;
        let mut writer = BufWriter::with_capacity(256 * 1024, file);
        serde_json::to_writer(&mut writer, chunk)?;
        writer.flush()
    }

    /// Clean overwrite: stale outputs for this language pair would otherwise
    /// survive as phantom chunks when the new run writes fewer files.
    fn remove_stale_outputs(&self, tidy_folder: &Path) -> io::Result<()> {
        let pair = format!("{}-{}", self.config.source_iso, self.config.target_iso);
        let lemmas = tidy_folder.join(format!("{}-lemmas.json", pair));
        if lemmas.exists() {
            fs::remove_file(&lemmas)?;
        }
        let forms_prefix = format!("{}-forms-", pair);
        for entry in fs::read_dir(tidy_folder)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&forms_prefix) && name.ends_with(".json") {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn phase_spinner(&self) -> ProgressBar {
        if self.config.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());
        pb
    }

    fn warn(&self, message: &str) {
        if !self.config.quiet {
            eprintln!("Warning: {}", message);
        }
    }
}

/// Locate the entry a record's senses belong to, advancing the etymology
/// slot past any that already carry definitions. Two homographs arriving
/// under the same etymology number land in successive slots instead of
/// overwriting each other.
fn next_free_entry<'a>(
    lemma_dict: &'a mut LemmaDict,
    word: &str,
    reading: &str,
    pos: &str,
    etymology_number: Option<u32>,
) -> &'a mut LemmaInfo {
    let slots = lemma_dict
        .entry(word.to_string())
        .or_default()
        .entry(reading.to_string())
        .or_default()
        .entry(pos.to_string())
        .or_default();

    let mut slot = etymology_number.unwrap_or(0);
    while slots
        .get(&slot)
        .map(|entry| !entry.gloss_tree.is_empty())
        .unwrap_or(false)
    {
        slot += 1;
    }
    slots.entry(slot).or_default()
}

/// Dedupe by transcription; tag sets for the same transcription are unioned.
fn merge_ipa(entry: &mut LemmaInfo, ipa_info: &IpaInfo) {
    if let Some(existing) = entry.ipa.iter_mut().find(|e| e.ipa == ipa_info.ipa) {
        for tag in &ipa_info.tags {
            if !existing.tags.contains(tag) {
                existing.tags.push(tag.clone());
            }
        }
    } else {
        entry.ipa.push(ipa_info.clone());
    }
}

/// The morpheme breakdown is the first period-delimited segment of the
/// etymology that spells out a composition ("wolken + kratzer") without
/// being an inheritance note.
fn morpheme_text(etymology: &str) -> Option<String> {
    etymology
        .split('.')
        .map(str::trim)
        .find(|segment| {
            segment.contains(" + ")
                && !segment.contains("Proto-")
                && !segment.starts_with("Inherited")
                && !segment.starts_with("Borrowed")
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::init_tag_order;

    fn session(source: &str, target: &str) -> TidySession {
        init_tag_order(None).unwrap();
        TidySession::new(TidyConfig::new(source, target))
    }

    fn entry<'a>(
        session: &'a TidySession,
        word: &str,
        reading: &str,
        pos: &str,
        slot: u32,
    ) -> &'a LemmaInfo {
        &session.lemma_dict[word][reading][pos][&slot]
    }

    #[test]
    fn inflection_sense_goes_to_forms_not_lemmas() {
        let mut s = session("en", "en");
        s.process_line(
            r#"{"word":"runs","pos":"verb","senses":[{"glosses":["third-person singular of run"],"form_of":[{"word":"run"}]}]}"#,
        )
        .unwrap();

        assert!(s.lemma_dict.is_empty());
        assert_eq!(
            s.forms["run"]["runs"]["verb"],
            vec!["third-person singular".to_string()]
        );
    }

    #[test]
    fn primary_senses_build_a_lemma_entry() {
        let mut s = session("en", "en");
        s.process_line(
            r#"{"word":"dog","pos":"noun","sounds":[{"ipa":"/dɒɡ/","tags":["UK"]},{"ipa":"/dɒɡ/","tags":["Received-Pronunciation"]}],
                "senses":[{"glosses":["animal","a domesticated canine"],"tags":["zoology"]},
                          {"glosses":["animal","a wild canine"],"tags":["zoology","rare"]}]}"#,
        )
        .unwrap();

        let info = entry(&s, "dog", "dog", "noun", 0);
        // IPA deduped by transcription, tags unioned
        assert_eq!(info.ipa.len(), 1);
        assert_eq!(info.ipa[0].tags, vec!["UK", "Received-Pronunciation"]);

        let tree_json = serde_json::to_value(&info.gloss_tree).unwrap();
        let top = &tree_json["map"][0];
        assert_eq!(top[0], "animal");
        let animal_entries = top[1]["map"].as_array().unwrap();
        assert_eq!(animal_entries[0][0], "_tags");
        assert_eq!(animal_entries[0][1], serde_json::json!(["zoology"]));
        assert_eq!(animal_entries[1][0], "a domesticated canine");
        assert_eq!(animal_entries[2][0], "a wild canine");
    }

    #[test]
    fn homographs_advance_etymology_slots() {
        let mut s = session("en", "en");
        let line = r#"{"word":"bass","pos":"noun","senses":[{"glosses":["a fish"]}]}"#;
        let line2 = r#"{"word":"bass","pos":"noun","senses":[{"glosses":["a low sound"]}]}"#;
        s.process_line(line).unwrap();
        s.process_line(line2).unwrap();

        let slots = &s.lemma_dict["bass"]["bass"]["noun"];
        assert_eq!(slots.len(), 2);
        assert!(slots[&0].gloss_tree.contains_key("a fish"));
        assert!(slots[&1].gloss_tree.contains_key("a low sound"));
    }

    #[test]
    fn explicit_etymology_number_seeds_the_slot() {
        let mut s = session("en", "en");
        s.process_line(
            r#"{"word":"lead","pos":"noun","etymology_number":2,"senses":[{"glosses":["a metal"]}]}"#,
        )
        .unwrap();
        assert!(s.lemma_dict["lead"]["lead"]["noun"].contains_key(&2));
    }

    #[test]
    fn etymology_and_head_texts_attach() {
        let mut s = session("de", "en");
        s.process_line(
            r#"{"word":"Wolkenkratzer","pos":"noun",
                "etymology_text":"From wolken + kratzer. Compare English skyscraper.",
                "head_templates":[{"name":"de-noun","expansion":"Wolkenkratzer m (strong, genitive Wolkenkratzers)"}],
                "senses":[{"glosses":["skyscraper"]}]}"#,
        )
        .unwrap();

        let info = entry(&s, "Wolkenkratzer", "Wolkenkratzer", "noun", 0);
        assert_eq!(
            info.etymology_text.as_deref(),
            Some("From wolken + kratzer. Compare English skyscraper.")
        );
        assert_eq!(info.morpheme_text.as_deref(), Some("From wolken + kratzer"));
        assert_eq!(
            info.head_info_text.as_deref(),
            Some("Wolkenkratzer m (strong, genitive Wolkenkratzers)")
        );
        assert_eq!(
            info.backlink.as_deref(),
            Some("https://en.wiktionary.org/wiki/Wolkenkratzer")
        );
    }

    #[test]
    fn malformed_line_is_fatal_by_default() {
        let mut s = session("en", "en");
        assert!(s.process_line("{not json").is_err());

        let mut lenient = session("en", "en");
        lenient.config.skip_malformed = true;
        assert!(lenient.process_line("{not json").is_ok());
        assert_eq!(lenient.stats.malformed_lines, 1);
    }

    #[test]
    fn morpheme_text_skips_inheritance_notes() {
        let text = "Inherited from Proto-Germanic *x + *y. From foo + bar. More prose.";
        assert_eq!(morpheme_text(text).as_deref(), Some("From foo + bar"));
        assert_eq!(morpheme_text("No composition here."), None);
    }

    #[test]
    fn pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = [
            r#"{"word":"run","pos":"verb","sounds":[{"ipa":"/ɹʌn/"}],"forms":[{"form":"ran","tags":["past"]},{"form":"runs","tags":["third-person","singular","present"]}],"senses":[{"glosses":["to move quickly"],"examples":[{"text":"I run daily.","english":"translated"}]}]}"#,
            r#"{"word":"runs","pos":"verb","senses":[{"glosses":["third-person singular of run"],"form_of":[{"word":"run"}]}]}"#,
        ];

        let run = |dir: &Path| -> (String, String) {
            let mut s = session("en", "en");
            for line in &corpus {
                s.process_line(line).unwrap();
            }
            s.finalize_and_write(dir).unwrap();
            assert_eq!(s.stats().missing_forms_populated, 1);
            let lemmas = fs::read_to_string(dir.join("en-en-lemmas.json")).unwrap();
            let forms = fs::read_to_string(dir.join("en-en-forms-0.json")).unwrap();
            (lemmas, forms)
        };

        let (lemmas_json, forms_json) = run(dir.path());

        // Lemma side: "run" present with its sense tree, "runs" absent
        let lemmas: serde_json::Value = serde_json::from_str(&lemmas_json).unwrap();
        assert!(lemmas.get("run").is_some());
        assert!(lemmas.get("runs").is_none());
        let tree = &lemmas["run"]["run"]["verb"]["0"]["glossTree"];
        assert_eq!(tree["_type"], "map");
        assert_eq!(tree["map"][0][0], "to move quickly");

        // Form side: explicit entry wins for "runs"; "ran" arrives via the
        // automated fallback
        let forms: FormsMap = serde_json::from_str(&forms_json).unwrap();
        assert_eq!(forms["run"]["runs"]["verb"], vec!["third-person singular".to_string()]);
        assert_eq!(forms["run"]["ran"]["verb"], vec!["past".to_string()]);

        // No self-inflections anywhere
        for (lemma, lemma_forms) in forms.iter() {
            for (form, _) in lemma_forms.iter() {
                assert_ne!(lemma, form);
            }
        }

        // Reprocessing is byte-identical
        let dir2 = tempfile::tempdir().unwrap();
        let (lemmas_again, forms_again) = run(dir2.path());
        assert_eq!(lemmas_json, lemmas_again);
        assert_eq!(forms_json, forms_again);
    }

    #[test]
    fn stale_outputs_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en-en-forms-7.json"), "stale").unwrap();

        let mut s = session("en", "en");
        s.process_line(r#"{"word":"cat","pos":"noun","senses":[{"glosses":["a feline"]}]}"#)
            .unwrap();
        s.finalize_and_write(dir.path()).unwrap();

        assert!(!dir.path().join("en-en-forms-7.json").exists());
        assert!(dir.path().join("en-en-forms-0.json").exists());
    }

    #[test]
    fn japanese_readings_each_get_an_entry() {
        let mut s = session("ja", "en");
        s.process_line(
            r#"{"word":"日本","pos":"noun","head_templates":[{"name":"ja-noun","args":{"1":"にほん"}},{"name":"ja-noun","args":{"1":"にっぽん"}}],"senses":[{"glosses":["Japan"]}]}"#,
        )
        .unwrap();

        let readings = &s.lemma_dict["日本"];
        assert!(readings.contains_key("にほん"));
        assert!(readings.contains_key("にっぽん"));
    }
}
