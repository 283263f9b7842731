use bzip2::read::BzDecoder;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

mod forms;
mod glosstree;
mod inflection;
mod lang;
mod map_json;
mod record;
mod tags;
mod tidy;

use glosstree::{ExampleOptions, DEFAULT_EXAMPLE_MAX_LENGTH};
use tags::init_tag_order;
use tidy::{TidyConfig, TidySession};

#[derive(Parser)]
#[command(name = "wiktionary-tidy-rust")]
#[command(about = "Normalize wiktextract corpus lines into lemma and form dictionaries")]
struct Args {
    /// Input corpus file (.jsonl or .jsonl.bz2), one record per line
    input: PathBuf,

    /// ISO code of the source language (the language of the words)
    source_iso: String,

    /// ISO code of the target language (the language of the glosses)
    target_iso: String,

    /// Output folder for the tidied dictionaries
    tidy_folder: PathBuf,

    /// Skip malformed JSON lines instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Disable multi-hop form chain resolution
    #[arg(long)]
    skip_chain_resolution: bool,

    /// Longest example sentence kept, in characters
    #[arg(long, default_value_t = DEFAULT_EXAMPLE_MAX_LENGTH)]
    max_example_length: usize,

    /// Cap on examples kept per sense (unlimited when omitted)
    #[arg(long)]
    max_examples: Option<usize>,

    /// Lemma keys per form dictionary chunk file
    #[arg(long, default_value_t = 10_000)]
    chunk_size: usize,

    /// Limit number of lines to process (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Path to tag order YAML (default: schema/tag_order.yaml)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    if let Err(e) = init_tag_order(args.schema.as_ref()) {
        eprintln!("Error loading tag order schema: {}", e);
        std::process::exit(1);
    }

    if !args.quiet {
        println!("Tidying: {}", args.input.display());
        println!("Language pair: {}-{}", args.source_iso, args.target_iso);
        println!("Output: {}", args.tidy_folder.display());
        if let Some(limit) = args.limit {
            println!("Limit: {} lines", limit);
        }
        println!();
    }

    let mut config = TidyConfig::new(&args.source_iso, &args.target_iso);
    config.skip_malformed = args.skip_malformed;
    config.resolve_chains = !args.skip_chain_resolution;
    config.chunk_size = args.chunk_size;
    config.quiet = args.quiet;
    config.examples = ExampleOptions {
        max_length: args.max_example_length,
        max_per_sense: args.max_examples,
    };

    let mut session = TidySession::new(config);

    let file = File::open(&args.input)?;
    let reader: Box<dyn BufRead> = if args.input.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap(),
        );
        pb
    };

    let start_time = Instant::now();
    let mut line_count = 0usize;

    for line in reader.lines() {
        let line = line?;
        session.process_line(&line)?;

        line_count += 1;
        if line_count % 1000 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = line_count as f64 / elapsed;
            pb.set_message(format!("Processing lines {} | Rate: {:.0} ln/s", line_count, rate));
        }

        if let Some(limit) = args.limit {
            if line_count >= limit {
                break;
            }
        }
    }
    pb.finish_and_clear();

    if !args.quiet {
        println!("Processed {} lines...", line_count);
    }

    session.finalize_and_write(&args.tidy_folder)?;

    if !args.quiet {
        print_stats(&session, start_time.elapsed());
    }

    Ok(())
}

fn print_stats(session: &TidySession, elapsed: Duration) {
    let stats = session.stats();
    println!();
    println!("============================================================");
    println!("Lines processed: {}", stats.lines);
    if stats.malformed_lines > 0 {
        println!("Malformed lines skipped: {}", stats.malformed_lines);
    }
    println!("Lemma dictionary words: {}", stats.lemma_words);
    println!("Form dictionary lemmas: {}", stats.form_lemmas);
    println!("Form chunks written: {}", stats.form_chunks_written);
    println!("------------------------------------------------------------");
    println!("Inflection senses: {}", stats.inflection_senses);
    println!("Ambiguous inflection senses dropped: {}", stats.ambiguous_senses_dropped);
    println!("Senses dropped for gloss nesting: {}", stats.glosses_dropped);
    println!("Missing forms automatically populated: {}", stats.missing_forms_populated);
    println!("Form chains resolved: {}", stats.chains_resolved);
    println!("------------------------------------------------------------");
    println!("Time: {}m {}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60);
    println!(
        "Rate: {:.0} lines/sec",
        stats.lines as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}
