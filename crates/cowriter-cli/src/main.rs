//! `cowriter` command-line front end.

mod cli;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use cowriter_stream::{
    CardStatus, ConsoleStream, EventSource, FileStore, GenerationOptions, GenerationRequest,
    Generator, HttpEventSource, ObservabilityConfig, RecordedSource, SuggestionCard,
};
use tracing::info;

use crate::cli::{Cli, Command, GenerateArgs, ReplayArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    // stdout carries the suggestion JSON.
    cowriter_stream::init_observability_with(
        ObservabilityConfig::from_env().console(ConsoleStream::Stderr),
    );

    let card = match Cli::parse().command {
        Command::Generate(args) => generate(args).await?,
        Command::Replay(args) => replay(args).await?,
    };
    report(&card)
}

async fn generate(args: GenerateArgs) -> anyhow::Result<SuggestionCard> {
    let content = cli::read_content(&args.content_file).await?;
    let source = HttpEventSource::from_env()?;
    run(
        Arc::new(source),
        args.request(content),
        args.options(),
        args.store.as_deref(),
    )
    .await
}

async fn replay(args: ReplayArgs) -> anyhow::Result<SuggestionCard> {
    let body = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read recording {}", args.file.display()))?;
    let source = match args.chunk_size {
        Some(size) => RecordedSource::chunked(body, size),
        None => RecordedSource::new(body),
    };
    let request = GenerationRequest::new(format!("replay of {}", args.file.display()));
    run(
        Arc::new(source),
        request,
        GenerationOptions::default(),
        args.store.as_deref(),
    )
    .await
}

async fn run(
    source: Arc<dyn EventSource>,
    request: GenerationRequest,
    options: GenerationOptions,
    store: Option<&std::path::Path>,
) -> anyhow::Result<SuggestionCard> {
    let mut builder = Generator::builder().source(source).options(options);
    if let Some(path) = store {
        builder = builder.store(Arc::new(FileStore::open(path)?));
    }
    let generator = builder.build()?;

    let mut handle = generator.start(request).await?;
    info!(card_id = %handle.card_id(), "generation started");
    let cancel = handle.cancel_handle();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_line = String::new();
    let mut last_preview: Option<String> = None;
    loop {
        tokio::select! {
            update = handle.next_update() => {
                let Some(card) = update else { break };
                let line = progress_line(&card);
                if line != last_line {
                    eprintln!("{line}");
                    last_line = line;
                }
                if !card.is_terminal()
                    && let Some(preview) = card.preview()
                    && last_preview.as_deref() != Some(preview)
                {
                    eprintln!("draft so far:\n{preview}");
                    last_preview = Some(preview.to_string());
                }
            }
            _ = &mut ctrl_c, if !cancel.is_cancelled() => {
                eprintln!("cancelling generation");
                cancel.cancel();
            }
        }
    }

    Ok(handle.finish().await?)
}

fn progress_line(card: &SuggestionCard) -> String {
    match (card.status_text(), card.raw_streaming_content()) {
        (Some(text), Some(raw)) => {
            format!("[{}] {text} ({} chars)", card.status().label(), raw.len())
        }
        (Some(text), None) => format!("[{}] {text}", card.status().label()),
        (None, _) => format!("[{}]", card.status().label()),
    }
}

fn report(card: &SuggestionCard) -> anyhow::Result<()> {
    match card.status() {
        CardStatus::Complete { suggestion } => {
            println!("{}", serde_json::to_string_pretty(suggestion)?);
            Ok(())
        }
        CardStatus::Failed { kind, message } => {
            anyhow::bail!("generation failed ({kind:?}): {message}")
        }
        CardStatus::Cancelled => anyhow::bail!("generation cancelled"),
        other => anyhow::bail!("generation ended in unexpected state {}", other.label()),
    }
}
