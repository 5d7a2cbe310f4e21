use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use w2v::export::{write_bvec, write_fvec};
use w2v::{Error, Model, Progress, SelfMatch, Silent, TrainConfig, VocabularySummary};

#[derive(Parser)]
#[command(about = "word2vec training and queries", long_about = None, version)]
struct Options {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a text corpus
    Train {
        /// Training configuration (see `w2v config`)
        #[arg(short = 'C', long = "config", value_name = "FILE")]
        config_file: PathBuf,

        /// Use text data from FILE to train the model
        #[arg(short = 'f', long = "corpus", value_name = "FILE")]
        corpus_file: PathBuf,

        /// Save the trained model to FILE
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_file: PathBuf,

        /// Use N threads
        #[arg(short = 't', long = "threads", value_name = "N", default_value_t = 12)]
        num_threads: usize,

        /// No progress bars, only warnings
        #[arg(long)]
        silent: bool,

        /// The vocabulary will be saved to FILE
        #[arg(long = "save-vocab", value_name = "FILE")]
        save_vocab_file: Option<PathBuf>,
    },

    /// Print a configuration file with the default training parameters
    Config,

    /// Find the words nearest to a query
    Lookup {
        #[arg(short = 'm', long = "model", value_name = "FILE")]
        model_file: PathBuf,

        /// Number of nearest words to show
        #[arg(short = 'k', long = "size", default_value_t = 30)]
        k: usize,

        /// Leave the query words out of the results
        #[arg(long)]
        exclude_query: bool,

        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Print the vector of a word
    Vector {
        #[arg(short = 'm', long = "model", value_name = "FILE")]
        model_file: PathBuf,

        word: String,
    },

    /// Embed every line of text files.
    ///
    /// For each FILE, vectors are written to FILE.fvecs and the embedded
    /// text to FILE.bvecs, one record per non-empty line.
    Embedding {
        #[arg(short = 'm', long = "model", value_name = "FILE")]
        model_file: PathBuf,

        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Write the vectors in word2vec text or binary format
    Export {
        #[arg(short = 'm', long = "model", value_name = "FILE")]
        model_file: PathBuf,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_file: PathBuf,

        /// Save the resulting vectors in binary mode
        #[arg(long)]
        binary: bool,
    },
}

/// Progress bars on stderr.
#[derive(Default)]
struct ConsoleProgress {
    parsing: Option<ProgressBar>,
    training: Option<ProgressBar>,
}

fn percent_bar(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template(
            "{prefix:>10} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix(message);
    bar
}

impl Progress for ConsoleProgress {
    fn parsing(&mut self, percent: f32) {
        let bar = self.parsing.get_or_insert_with(|| percent_bar("reading"));
        bar.set_position(percent as u64);
    }

    fn vocabulary(&mut self, summary: &VocabularySummary) {
        if let Some(bar) = self.parsing.take() {
            bar.finish();
        }
        eprintln!(
            "Vocab size: {}  Words in train file: {}  Total words: {}",
            summary.vocabulary_size, summary.train_words, summary.total_words
        );
    }

    fn training(&mut self, alpha: f32, percent: f32) {
        let bar = self.training.get_or_insert_with(|| percent_bar("training"));
        bar.set_position(percent as u64);
        bar.set_message(format!("alpha {alpha:.6}"));
        if percent >= 100.0 {
            bar.finish();
        }
    }
}

fn init_logging(silent: bool) {
    let default = if silent { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_writer(io::stderr).with_env_filter(filter).init();
}

fn train(
    config_file: &Path,
    corpus_file: &Path,
    output_file: &Path,
    num_threads: usize,
    silent: bool,
    save_vocab_file: Option<&Path>,
) -> Result<()> {
    let config = TrainConfig::from_file(config_file)?;
    let mut settings = config.to_settings()?;
    settings.threads = num_threads;

    let mut console = ConsoleProgress::default();
    let mut quiet = Silent;
    let progress: &mut dyn Progress = if silent { &mut quiet } else { &mut console };
    let model = Model::train_and_save(
        settings,
        corpus_file,
        config.stop_words(),
        output_file,
        progress,
    )
    .context("training failed")?;

    if let Some(f) = save_vocab_file {
        model.vocabulary().save(f)?;
    }
    Ok(())
}

fn lookup(model_file: &Path, k: usize, exclude_query: bool, words: &[String]) -> Result<()> {
    let model = Model::load(model_file)?;
    let self_match = if exclude_query {
        SelfMatch::Exclude
    } else {
        SelfMatch::Include
    };
    let neighbors = model.lookup(&words.join(" "), k, self_match)?;

    let mut out = io::stdout().lock();
    for n in &neighbors {
        writeln!(out, "{:>15} : {:.6}", n.word, n.similarity)?;
    }
    Ok(())
}

fn vector(model_file: &Path, word: &str) -> Result<()> {
    let model = Model::load(model_file)?;
    let vec = model.vector_of(word)?;
    let mut out = io::stdout().lock();
    write!(out, "{word}")?;
    for f in vec {
        write!(out, " {f}")?;
    }
    writeln!(out)?;
    Ok(())
}

fn embed_file(model: &Model, text_file: &Path) -> Result<()> {
    let fvecs_file = text_file.with_extension("fvecs");
    let bvecs_file = text_file.with_extension("bvecs");
    let fin = BufReader::new(
        File::open(text_file).with_context(|| format!("error opening {text_file:?}"))?,
    );
    let mut fvecs = BufWriter::new(
        File::create(&fvecs_file).with_context(|| format!("error creating {fvecs_file:?}"))?,
    );
    let mut bvecs = BufWriter::new(
        File::create(&bvecs_file).with_context(|| format!("error creating {bvecs_file:?}"))?,
    );

    let delimiters = &model.settings().word_delimiters;
    let start = Instant::now();
    let mut count = 0usize;
    for line in fin.lines() {
        let line = line.with_context(|| format!("error reading {text_file:?}"))?;
        let text = line.trim_matches(|c: char| delimiters.contains(c));
        if text.is_empty() {
            continue;
        }
        let vec = match model.embedding(text) {
            Ok(vec) => vec,
            Err(Error::EmptyDocument) => {
                warn!(text, "skipping line with no known words");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        write_fvec(&mut fvecs, &vec).with_context(|| format!("error writing {fvecs_file:?}"))?;
        write_bvec(&mut bvecs, text.as_bytes())
            .with_context(|| format!("error writing {bvecs_file:?}"))?;
        count += 1;
    }
    fvecs.flush().with_context(|| format!("error writing {fvecs_file:?}"))?;
    bvecs.flush().with_context(|| format!("error writing {bvecs_file:?}"))?;

    let elapsed = start.elapsed();
    eprintln!("==> {}", text_file.display());
    eprintln!("\tvectors: {count}");
    eprintln!("\t   time: {elapsed:?}");
    eprintln!("\t  op/ns: {}", elapsed.as_nanos() / count.max(1) as u128);
    Ok(())
}

fn embedding(model_file: &Path, files: &[PathBuf]) -> Result<()> {
    let model = Model::load(model_file)?;
    for f in files {
        embed_file(&model, f)?;
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Train {
            config_file,
            corpus_file,
            output_file,
            num_threads,
            silent,
            save_vocab_file,
        } => train(
            &config_file,
            &corpus_file,
            &output_file,
            num_threads,
            silent,
            save_vocab_file.as_deref(),
        ),
        Command::Config => {
            io::stdout().write_all(w2v::config::DEFAULT_CONFIG.as_bytes())?;
            Ok(())
        }
        Command::Lookup {
            model_file,
            k,
            exclude_query,
            words,
        } => lookup(&model_file, k, exclude_query, &words),
        Command::Vector { model_file, word } => vector(&model_file, &word),
        Command::Embedding { model_file, files } => embedding(&model_file, &files),
        Command::Export {
            model_file,
            output_file,
            binary,
        } => {
            let model = Model::load(&model_file)?;
            model.export_word2vec(&output_file, binary)?;
            Ok(())
        }
    }
}

fn main() {
    let options = Options::parse();
    let silent = matches!(options.command, Command::Train { silent: true, .. });
    init_logging(silent);

    if let Err(err) = run(options.command) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
