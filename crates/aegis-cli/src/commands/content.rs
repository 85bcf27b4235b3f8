//! `aegis content`: Store and fetch blobs in the node's content store.

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use aegis_registry::ContentRef;

use super::{get_json, post_json, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct ContentArgs {
    #[command(subcommand)]
    pub command: ContentCommand,

    /// API endpoint of the node.
    #[arg(short, long, global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Subcommand, Debug)]
pub enum ContentCommand {
    /// Upload a file and print its content reference.
    Put {
        /// File to upload.
        file: PathBuf,
    },
    /// Download a blob by reference.
    Get {
        /// Content reference (`z...`).
        content_ref: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PutContentRequest {
    data: String,
}

#[derive(Deserialize)]
pub struct ContentResponse {
    pub content_ref: ContentRef,
    pub size: usize,
}

#[derive(Deserialize)]
struct ContentBody {
    content_ref: ContentRef,
    data: String,
}

pub async fn run(args: &ContentArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    match &args.command {
        ContentCommand::Put { file } => {
            let stored = upload_file(&client, &args.endpoint, file).await?;
            println!("Content stored!");
            println!("  Ref:   {}", stored.content_ref);
            println!("  Size:  {} bytes", stored.size);
        }
        ContentCommand::Get { content_ref, out } => {
            let content_ref: ContentRef = content_ref.parse()?;
            let bytes = download(&client, &args.endpoint, &content_ref).await?;

            match out {
                Some(path) => {
                    std::fs::write(path, &bytes)?;
                    println!("Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
    }

    Ok(())
}

/// Upload a file's bytes to the node's content store.
pub async fn upload_file(
    client: &reqwest::Client,
    endpoint: &str,
    file: &Path,
) -> anyhow::Result<ContentResponse> {
    let bytes =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let stored = upload_bytes(client, endpoint, &bytes).await?;
    tracing::debug!(content_ref = %stored.content_ref, file = %file.display(), "uploaded");
    Ok(stored)
}

/// Upload a blob and check the node addressed it by its hash.
pub async fn upload_bytes(
    client: &reqwest::Client,
    endpoint: &str,
    bytes: &[u8],
) -> anyhow::Result<ContentResponse> {
    let expected = ContentRef::of(bytes);
    let body = PutContentRequest {
        data: STANDARD.encode(bytes),
    };

    let stored: ContentResponse =
        post_json(client, endpoint, "/api/v1/content", &body, "content upload").await?;
    if stored.content_ref != expected {
        anyhow::bail!(
            "node returned reference {} but the content hashes to {}",
            stored.content_ref,
            expected
        );
    }
    Ok(stored)
}

/// Fetch a blob and check it hashes to `content_ref`.
pub async fn download(
    client: &reqwest::Client,
    endpoint: &str,
    content_ref: &ContentRef,
) -> anyhow::Result<Vec<u8>> {
    let body: ContentBody = get_json(
        client,
        endpoint,
        &format!("/api/v1/content/{}", content_ref),
        "content fetch",
    )
    .await?;
    let bytes = STANDARD
        .decode(body.data.as_bytes())
        .context("node returned invalid base64")?;
    if body.content_ref != *content_ref || !content_ref.matches(&bytes) {
        anyhow::bail!("node returned bytes that do not hash to {}", content_ref);
    }
    Ok(bytes)
}
