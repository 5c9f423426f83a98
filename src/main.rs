use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use docsum::config::{self, AppConfig};
use docsum::db::{DocumentStore, SqliteDocumentStore};
use docsum::pipeline::extraction::{ChannelProgressSink, ProgressEvent, ProgressSink, SourceFile};
use docsum::pipeline::processor::{build_extraction_pipeline, DocumentProcessor};
use docsum::pipeline::summarize::{GeminiClient, PromptSummarizer, SummarizeError, SummaryLength};

/// Extract and summarize text from PDFs, images, and plain-text files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text extracted from a file
    Extract {
        /// PDF, image, or text file
        file_path: PathBuf,
    },

    /// Summarize a file and list improvement suggestions
    Summarize {
        /// PDF, image, or text file
        file_path: PathBuf,

        /// short, medium, or long
        #[arg(short, long, default_value = "medium")]
        length: SummaryLength,

        /// Save the result to the document history
        #[arg(long)]
        save: bool,
    },

    /// List saved documents, newest first
    History,

    /// Delete a saved document
    Delete {
        /// Document id as shown by `history`
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    docsum::init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Command::Extract { file_path } => extract(&config, file_path).await,
        Command::Summarize {
            file_path,
            length,
            save,
        } => summarize(&config, file_path, length, save).await,
        Command::History => history(&config),
        Command::Delete { id } => delete(&config, id),
    }
}

fn load_source(file_path: &Path) -> anyhow::Result<SourceFile> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }
    Ok(SourceFile::from_path(file_path)?)
}

fn open_store(config: &AppConfig) -> anyhow::Result<SqliteDocumentStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteDocumentStore::open(&config.database_path)?)
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

fn progress_bar(message: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.green/dim}] {pos}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Drive `bar` from extraction events until the sender side is dropped.
fn follow_progress(
    bar: ProgressBar,
    mut rx: UnboundedReceiver<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            bar.set_position(u64::from(event.percent));
        }
        bar.finish_and_clear();
    })
}

async fn extract(config: &AppConfig, file_path: PathBuf) -> anyhow::Result<()> {
    let file = load_source(&file_path)?;
    let pipeline = Arc::new(build_extraction_pipeline(config)?);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let (sink, rx) = ChannelProgressSink::new();
    let follower = follow_progress(progress_bar("Extracting"), rx);

    let sink: Arc<dyn ProgressSink> = Arc::new(sink);
    let result = pipeline.extract_text_async(file, Some(sink), cancel).await;
    follower.await?;

    let text = result?;
    if text.trim().is_empty() {
        anyhow::bail!("No text could be extracted. Try a clearer scan or higher-quality image.");
    }
    println!("{text}");
    Ok(())
}

async fn summarize(
    config: &AppConfig,
    file_path: PathBuf,
    length: SummaryLength,
    save: bool,
) -> anyhow::Result<()> {
    let file = load_source(&file_path)?;

    let gemini = &config.gemini;
    if gemini.api_key.is_empty() {
        return Err(SummarizeError::MissingApiKey.into());
    }
    let client = GeminiClient::new(
        &gemini.base_url,
        &gemini.api_key,
        &gemini.model,
        gemini.timeout_secs,
    )?;
    let mut processor = DocumentProcessor::new(
        Arc::new(build_extraction_pipeline(config)?),
        Box::new(PromptSummarizer::new(client)),
    );
    if save {
        processor = processor.with_store(Arc::new(open_store(config)?));
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let (sink, rx) = ChannelProgressSink::new();
    let follower = follow_progress(progress_bar("Extracting"), rx);

    // Extraction and the blocking HTTP client both stay off the runtime threads.
    let output = tokio::task::spawn_blocking(move || {
        processor.process(&file, length, save, Some(&sink), &cancel)
    })
    .await?;
    follower.await?;
    let output = output?;

    println!("Summary ({}):\n", output.summary.length.as_str());
    println!("{}\n", output.summary.summary.trim());
    if !output.summary.suggestions.is_empty() {
        println!("Suggestions:");
        for (i, suggestion) in output.summary.suggestions.iter().enumerate() {
            println!("  {}. {suggestion}", i + 1);
        }
    }
    if let Some(document) = output.document {
        println!("\nSaved as {}", document.id);
    }
    Ok(())
}

fn history(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let documents = store.list()?;
    if documents.is_empty() {
        println!("No saved documents.");
        return Ok(());
    }

    for document in documents {
        let headline = document.summary.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        println!(
            "{}  {}  {:<5}  {}  {}",
            document.id,
            document.created_at.format("%Y-%m-%d %H:%M"),
            document.file_type.as_str(),
            document.filename,
            headline.trim()
        );
    }
    Ok(())
}

fn delete(config: &AppConfig, id: Uuid) -> anyhow::Result<()> {
    let store = open_store(config)?;
    store.delete(&id)?;
    println!("Deleted {id}");
    Ok(())
}
