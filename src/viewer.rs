//! Opening and downloading stored document files.
//!
//! Viewing never fails: a URL we cannot render comes back as a `Fallback`
//! carrying the reason, and the caller offers a download link instead.

use std::path::{Path, PathBuf};

use reqwest::{Client, Url};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{FleetError, Result};

const PDF_EXTENSIONS: [&str; 1] = ["pdf"];
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ViewOutcome {
    Rendered { url: String, kind: DocumentKind },
    Fallback { url: String, reason: String },
}

impl ViewOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Rendered { url, .. } | Self::Fallback { url, .. } => url,
        }
    }
}

/// Last non-empty path segment of a URL, percent-encoding left as is.
pub fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn view(raw: &str) -> ViewOutcome {
    let url = raw.trim().to_string();
    let parsed = match Url::parse(&url) {
        Ok(u) => u,
        Err(e) => {
            return ViewOutcome::Fallback {
                url,
                reason: format!("not a valid URL ({e})"),
            }
        }
    };
    if !matches!(parsed.scheme(), "http" | "https" | "file") {
        return ViewOutcome::Fallback {
            reason: format!("unsupported scheme: {}", parsed.scheme()),
            url,
        };
    }

    let ext = file_name(&parsed).as_deref().and_then(extension);
    match ext.as_deref() {
        Some(e) if PDF_EXTENSIONS.contains(&e) => ViewOutcome::Rendered { url, kind: DocumentKind::Pdf },
        Some(e) if IMAGE_EXTENSIONS.contains(&e) => ViewOutcome::Rendered { url, kind: DocumentKind::Image },
        Some(e) => ViewOutcome::Fallback {
            url,
            reason: format!("cannot preview .{e} files"),
        },
        None => ViewOutcome::Fallback {
            url,
            reason: "file type unknown".to_string(),
        },
    }
}

/// Fetch `url` into `dest_dir`, naming the file after the URL's last path
/// segment. The body is written chunk by chunk.
pub async fn download(client: &Client, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| FleetError::Other(format!("Invalid URL {url}: {e}")))?;
    let name = file_name(&parsed).unwrap_or_else(|| "document".to_string());
    let dest = dest_dir.join(name);

    debug!(url, "downloading document");
    let mut response = client.get(parsed).send().await?.error_for_status()?;

    tokio::fs::create_dir_all(dest_dir).await?;
    let mut file = tokio::fs::File::create(&dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!(path = %dest.display(), bytes = written, "document saved");
    Ok(dest)
}
