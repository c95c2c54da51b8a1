// src/main.rs
mod utils;
mod converter;
mod extractors;
mod quiz;
mod storage;

use std::path::PathBuf;

use clap::Parser;
use converter::Converter;
use extractors::{derive_title, parse_word_file, QuizExtractor};
use storage::StorageManager;
use utils::AppError;

/// Command Line Interface for the exam document extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exam document to extract (.docx, .html/.htm or .txt)
    input: PathBuf,

    /// Output directory for the extracted quiz
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Spread this many points evenly over the extracted questions
    #[arg(long)]
    total_score: Option<f64>,

    /// Debug mode - save the classified block stream as annotated HTML
    #[arg(short, long)]
    debug: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Write single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting extraction for args: {:?}", args);

    if let Some(total) = args.total_score {
        if !total.is_finite() || total < 0.0 {
            return Err(AppError::Config(format!("--total-score must be a non-negative number, got {}", total)));
        }
    }

    // 3. Initialize storage and pick a converter for the input
    let storage = StorageManager::new(&args.output_dir, !args.compact)?;
    let converter = Converter::for_path(&args.input)?;

    // 4. Read, convert and extract
    let mut quiz = if args.debug {
        let extractor = QuizExtractor::new();
        let stream = extractor.load_block_stream(&converter, &args.input).await?;

        let classified = extractor.classify_stream(&stream);
        let title = derive_title(&args.input);
        let debug_path = PathBuf::from(&args.output_dir)
            .join(format!("{}_annotated.html", storage::slugify(&title)));
        if let Err(e) = utils::html_debug::save_debug_html(&classified, &debug_path) {
            tracing::warn!("Failed to create debug HTML: {}", e);
        }

        extractor.extract(&stream, &title)?
    } else {
        parse_word_file(&converter, &args.input).await?
    };

    // 5. Optional even score distribution
    if let Some(total) = args.total_score {
        crate::quiz::scoring::distribute_even(&mut quiz.questions, total);
        tracing::info!("Assigned {} points across {} questions", total, quiz.questions.len());
    }

    // 6. Save quiz and metadata
    let quiz_path = storage.save_quiz(&quiz)?;
    match storage.save_quiz_metadata(&quiz, &args.input) {
        Ok(path) => tracing::info!("Saved quiz metadata to: {}", path.display()),
        Err(e) => tracing::error!("Failed to save quiz metadata: {}", e),
    }

    tracing::info!(
        "Extraction finished: {} questions in {} part(s) -> {}",
        quiz.questions.len(),
        quiz.part_ids().len(),
        quiz_path.display()
    );

    Ok(())
}
