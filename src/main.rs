use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use futures::{Stream, StreamExt};
use iocraft::prelude::*;
use std::{
    io::{self, Write},
    time::{Duration, SystemTime},
};
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

use twup::{
    CancelHandle, DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_UPLOAD_URL, FileSource, HttpTransport,
    MediaClient, UploadError, UploadEvent, UploadOptions, UploadResult, cancel_pair,
    check_attachment_set,
};

use crate::ui::{
    ConfigHeader, ErrorMessage, InputPrompt, ProgressBar, SuccessMessage, UploadSummary,
    UploadedMedia,
};

mod config;
mod ui;

const LOG_ENV: &str = "TWUP_LOG";

#[derive(Parser)]
#[command(name = "twup")]
#[command(version)]
#[command(about = "A tool for chunked media uploads to the Twitter API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure twup interactively
    Config,
    /// Store your bearer token in the OS keyring
    SetToken { token: String },
    /// Upload media for a single post and print the media ids
    Upload {
        /// Files or http(s) URLs; up to 4 images, or 1 GIF, or 1 video
        #[arg(required = true, value_hint = ValueHint::AnyPath)]
        media: Vec<String>,
        /// Maximum bytes per APPEND segment
        #[arg(short, long)]
        chunk_size: Option<u64>,
    },
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_tracing();

    rt.block_on(async {
        match cli.command {
            Commands::Config => interactive_config(),
            Commands::SetToken { token } => config::set_token_keyring(token),
            Commands::Upload { media, chunk_size } => {
                let config = config::read_config()?;
                let chunk_size = chunk_size.unwrap_or(config.chunk_size);
                let http = reqwest::Client::new();
                let client = MediaClient::with_transport(HttpTransport::with_client(
                    http.clone(),
                    config.upload_url,
                    config.token,
                ));
                upload_media(&client, &http, media, chunk_size).await
            }
        }
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn open_source(http: &reqwest::Client, media: &str) -> Result<FileSource> {
    if let Ok(url) = Url::parse(media)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(FileSource::fetch(http, url).await?);
    }

    FileSource::open(media)
        .await
        .with_context(|| format!("Failed to open {}", media))
}

async fn upload_media(
    client: &MediaClient<HttpTransport>,
    http: &reqwest::Client,
    media: Vec<String>,
    chunk_size: u64,
) -> Result<()> {
    let mut sources = Vec::with_capacity(media.len());
    for item in &media {
        sources.push(open_source(http, item).await?);
    }
    check_attachment_set(&sources)?;

    let (cancel, token) = cancel_pair();
    tokio::spawn(async move {
        let interrupts = Box::pin(async_stream::stream! {
            while tokio::signal::ctrl_c().await.is_ok() {
                yield ();
            }
        });
        if forward_interrupts(interrupts, cancel).await {
            std::process::exit(130);
        }
    });

    let options = UploadOptions::default()
        .with_chunk_size(chunk_size)
        .close_after(true)
        .with_cancel(token);

    let mut uploaded = Vec::with_capacity(sources.len());
    for source in sources.iter_mut() {
        let name = source.display_name().to_string();
        let result = upload_with_progress_bar(client, source, options.clone())
            .await
            .map_err(explain_upload_error)?;
        uploaded.push(UploadedMedia::new(&name, &result));
    }

    element!(UploadSummary(title: "Upload complete".to_string(), media: uploaded)).print();
    Ok(())
}

/// Cancels the upload on the first interrupt; returns true on the second.
async fn forward_interrupts<S>(mut interrupts: S, cancel: CancelHandle) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    cancel.cancel();
    warn!("cancelling upload, press Ctrl-C again to exit immediately");
    interrupts.next().await.is_some()
}

async fn upload_with_progress_bar(
    client: &MediaClient<HttpTransport>,
    source: &mut FileSource,
    options: UploadOptions,
) -> Result<UploadResult> {
    let (tx, rx) = watch::channel(0.0);
    let title = format!("Uploading {}", source.display_name());

    let mut progress_bar = element!(ProgressBar(title: title, progress: Some(rx)));

    tokio::select! {
        result = drive_upload(client, source, options, tx) => result,
        _ = progress_bar.render_loop() => {
            bail!("Progress display stopped before the upload finished")
        }
    }
}

async fn drive_upload(
    client: &MediaClient<HttpTransport>,
    source: &mut FileSource,
    options: UploadOptions,
    tx: watch::Sender<f32>,
) -> Result<UploadResult> {
    let mut stream = client.upload_with_progress(source, options)?;

    while let Some(event) = stream.next().await {
        match event? {
            UploadEvent::Progress(p) => {
                let percent = if p.total_bytes == 0 {
                    100.0
                } else {
                    (p.bytes_uploaded as f32 / p.total_bytes as f32) * 100.0
                };
                let _ = tx.send(percent);
            }
            UploadEvent::Complete(result) => return Ok(result),
        }
    }

    Err(anyhow!("Upload ended without a FINALIZE response"))
}

fn explain_upload_error(err: anyhow::Error) -> anyhow::Error {
    let wait = match err.downcast_ref::<UploadError>() {
        Some(UploadError::RateLimited { rate_limit, .. }) => {
            rate_limit.wait_hint(SystemTime::now())
        }
        _ => None,
    };

    match wait {
        Some(wait) => {
            let wait = Duration::from_secs(wait.as_secs().max(1));
            err.context(format!("Try again in {}", humantime::format_duration(wait)))
        }
        None => err,
    }
}

fn read_input(prompt: &str, default: Option<&str>, description: Option<&str>) -> Result<String> {
    element! {
        InputPrompt(
            prompt: prompt.to_string(),
            default: default.map(|s| s.to_string()),
            description: description.map(|s| s.to_string())
        )
    }
    .print();

    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    if input.is_empty() {
        if let Some(def) = default {
            Ok(def.to_string())
        } else {
            Ok(input)
        }
    } else {
        Ok(input)
    }
}

fn interactive_config() -> Result<()> {
    element!(ConfigHeader()).print();

    let upload_url = loop {
        let url_str = read_input(
            "Upload URL",
            Some(DEFAULT_UPLOAD_URL),
            Some("The media/upload endpoint to send INIT, APPEND and FINALIZE to"),
        )?;

        match Url::parse(&url_str) {
            Ok(url) => break url,
            Err(e) => {
                element!(ErrorMessage(message: format!("Invalid URL: {}", e))).print();
                println!();
            }
        }
    };

    let default_chunk_size = DEFAULT_CHUNK_SIZE_BYTES.to_string();
    let chunk_size = loop {
        let chunk_size_str = read_input(
            "Chunk size",
            Some(default_chunk_size.as_str()),
            Some("Maximum bytes sent in one APPEND segment"),
        )?;

        match chunk_size_str.parse::<u64>() {
            Ok(size) if size > 0 => break size,
            _ => {
                element!(ErrorMessage(message: "Chunk size must be a positive integer".to_string()))
                    .print();
                println!();
            }
        }
    };

    let token = loop {
        let token = read_input(
            "Bearer token",
            None,
            Some("Your Twitter API bearer token (stored securely in OS keyring)"),
        )?;

        if token.is_empty() {
            element!(ErrorMessage(message: "Bearer token cannot be empty".to_string())).print();
            println!();
        } else {
            break token;
        }
    };

    config::set_token_keyring(token)?;

    let config_file = config::ConfigFile {
        upload_url: Some(upload_url),
        chunk_size: Some(chunk_size),
    };

    config::write_config(config_file)?;

    element!(SuccessMessage(message: "Configuration complete!".to_string())).print();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_first_interrupt_cancels() {
        let (cancel, token) = cancel_pair();

        let exit = forward_interrupts(stream::iter([()]), cancel).await;

        assert!(token.is_cancelled());
        assert!(!exit);
    }

    #[tokio::test]
    async fn test_second_interrupt_exits() {
        let (cancel, token) = cancel_pair();

        let exit = forward_interrupts(stream::iter([(), ()]), cancel).await;

        assert!(token.is_cancelled());
        assert!(exit);
    }

    #[tokio::test]
    async fn test_no_interrupt_leaves_upload_running() {
        let (cancel, token) = cancel_pair();

        let exit = forward_interrupts(stream::empty(), cancel).await;

        assert!(!token.is_cancelled());
        assert!(!exit);
    }
}
