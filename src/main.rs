//! CLI entry point for building codebooks and encoding text files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ndarray::Array2;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use arpacode::config::DEFAULT_CACHE_PATH;
use arpacode::constants::{CODEPOINT_OFFSET, DEFAULT_MAXLEN};
use arpacode::{
    verify_lines, verify_records, CodebookInputs, JsonFileCache, PhoneticEncoder, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "arpacode")]
#[command(about = "Phonetic substitution and fixed-width encoding of text")]
struct Cli {
    #[command(flatten)]
    codebook: CodebookArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CodebookArgs {
    /// Codebook cache file
    #[arg(long, global = true, default_value = DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// Phoneme symbol list, one symbol per line
    #[arg(long, global = true, default_value = "cmudict-0.7b.symbols")]
    symbols: PathBuf,

    /// Pronouncing dictionary (word<TAB>phonemes)
    #[arg(long, global = true, default_value = "simplified_cmudict.txt")]
    dictionary: PathBuf,

    /// Corpus files whose characters reserved symbols must avoid
    #[arg(long, global = true)]
    corpus: Vec<PathBuf>,

    /// Record length, end marker included
    #[arg(long, global = true, default_value_t = DEFAULT_MAXLEN)]
    maxlen: usize,

    /// First codepoint tried for reserved symbols
    #[arg(long, global = true, default_value_t = CODEPOINT_OFFSET)]
    offset: u32,

    /// Rebuild the cache if it was built from different inputs
    #[arg(long, global = true)]
    verify_fingerprint: bool,

    /// Encode plain characters without dictionary substitution
    #[arg(long, global = true)]
    alphabetic: bool,
}

impl CodebookArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            cache_path: self.cache.clone(),
            maxlen: self.maxlen,
            codepoint_offset: self.offset,
            verify_fingerprint: self.verify_fingerprint,
            phonetic: !self.alphabetic,
        }
    }

    fn inputs(&self) -> CodebookInputs {
        CodebookInputs::new(&self.symbols, &self.dictionary, self.corpus.clone())
    }

    fn encoder(&self) -> Result<PhoneticEncoder> {
        PhoneticEncoder::from_config(&self.config(), &self.inputs()).context("Failed to load codebook")
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the codebook cache
    Build {
        /// Discard an existing cache first
        #[arg(long)]
        force: bool,
    },
    /// Encode each line of a text file into a [lines, maxlen] u8 .npy array
    Encode {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "records.npy")]
        output: PathBuf,
    },
    /// Decode records from a .npy file and print them with phoneme symbols
    Inspect {
        #[arg(short, long)]
        input: PathBuf,

        /// Only print the first N records
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Check that every line of a text file survives an encode/decode round trip
    Verify {
        #[arg(short, long)]
        input: PathBuf,

        /// Also check stored records in this .npy file
        #[arg(long)]
        records: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build { force } => {
            if force {
                JsonFileCache::new(&cli.codebook.cache).clear()?;
            }
            let encoder = cli.codebook.encoder()?;
            let codebook = encoder.codebook();
            println!(
                "Codebook: {} words, {} phonemes, {} code table symbols",
                codebook.artifacts().word_to_phonetic.len(),
                codebook.phonetic_symbols().len(),
                encoder.table().len()
            );
        }
        Command::Encode { input, output } => {
            let encoder = cli.codebook.encoder()?;
            let lines = read_lines(&input)?;
            let batch = encoder.encode_lines(&lines)?;
            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            batch
                .write_npy(BufWriter::new(file))
                .context("Failed to write records")?;
            println!("Encoded {} lines to {:?} (shape {:?})", lines.len(), output, batch.shape());
        }
        Command::Inspect { input, limit } => {
            let encoder = cli.codebook.encoder()?;
            let records = read_records(&input)?;
            for (index, record) in records.rows().into_iter().enumerate().take(limit.unwrap_or(usize::MAX)) {
                let (decoded, readable) = encoder.inspect(record);
                let flag = if decoded.is_well_formed() { "" } else { " [malformed]" };
                println!("{}{}: {}", index, flag, readable);
            }
        }
        Command::Verify { input, records } => {
            let encoder = cli.codebook.encoder()?;
            let lines = read_lines(&input)?;
            let mut passed = true;

            let report = verify_lines(&encoder, &lines)?;
            println!("lines: {}", report);
            passed &= report.passes();

            if let Some(path) = records {
                let stored = read_records(&path)?;
                let report = verify_records(&encoder, stored.view());
                println!("records: {}", report);
                passed &= report.passes();
            }

            if !passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn read_records(path: &Path) -> Result<Array2<u8>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Array2::<u8>::read_npy(file).with_context(|| format!("Failed to read records from {}", path.display()))
}
