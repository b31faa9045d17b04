use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::pin::pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use image::ImageReader;
use reqwest::StatusCode;
use teloxide::Bot;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, PhotoSize};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::apis::telegram::TelegramError;

pub const MEBIBYTE: u64 = 1024 * 1024;
/// Bot API `getFile` download limit
pub const MAX_CHAT_FILE_SIZE: u64 = 20 * MEBIBYTE;
pub const MAX_RESULT_SIZE: u64 = 50 * MEBIBYTE;
const WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub enum FetchError {
    Telegram(TelegramError),
    Request(reqwest::Error),
    Status(StatusCode),
    /// the platform returned no downloadable path for the handle
    Expired,
    TooLarge(u64),
    Filesystem(io::Error),
    InvalidImage(image::ImageError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telegram(err) => write!(f, "{err}"),
            Self::Request(err) => write!(f, "download failed: {err}"),
            Self::Status(status) => write!(f, "download failed with {status}"),
            Self::Expired => write!(f, "the file is no longer available"),
            Self::TooLarge(size) => write!(f, "the file is too large ({size} bytes)"),
            Self::Filesystem(err) => write!(f, "filesystem error: {err}"),
            Self::InvalidImage(err) => write!(f, "the file is not a supported image: {err}"),
        }
    }
}

impl From<TelegramError> for FetchError {
    fn from(value: TelegramError) -> Self {
        Self::Telegram(value)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.without_url())
    }
}

impl From<io::Error> for FetchError {
    fn from(value: io::Error) -> Self {
        Self::Filesystem(value)
    }
}

impl From<image::ImageError> for FetchError {
    fn from(value: image::ImageError) -> Self {
        Self::InvalidImage(value)
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_chat_file(&self, file_id: &FileId) -> Result<Bytes, FetchError>;
    async fn fetch_url(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// the photo a user sent, fetched into memory
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub file_unique_id: String,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    pub fn relay_filename(&self) -> String {
        format!("{}.jpg", self.file_unique_id)
    }
}

pub async fn acquire(
    fetcher: &dyn ImageFetcher,
    photo: &PhotoSize,
) -> Result<SourceImage, FetchError> {
    let size = u64::from(photo.file.size);
    if size > MAX_CHAT_FILE_SIZE {
        return Err(FetchError::TooLarge(size));
    }

    let bytes = fetcher.fetch_chat_file(&photo.file.id).await?;
    let (width, height) =
        ImageReader::new(Cursor::new(&bytes[..])).with_guessed_format()?.into_dimensions()?;
    let file_unique_id = photo.file.unique_id.to_string();
    log::debug!("acquired {file_unique_id} ({width}x{height}, {} bytes)", bytes.len());

    Ok(SourceImage { file_unique_id, bytes, width, height })
}

/// a download written into its own temporary directory, removed on drop
pub struct ScopedDownload {
    temp_dir: TempDir,
    pub file_path: PathBuf,
}

impl ScopedDownload {
    pub async fn from_stream<S, E>(
        parent: &Path,
        filename: &str,
        stream: S,
        max_size: u64,
    ) -> Result<Self, FetchError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        FetchError: From<E>,
    {
        let mut stream = pin!(stream);
        let temp_dir = TempDir::new_in(parent)?;
        let file_path = temp_dir.path().join(sanitize_filename(filename));
        let mut file = BufWriter::with_capacity(WRITE_BUFFER_SIZE, File::create(&file_path).await?);

        let mut written = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > max_size {
                return Err(FetchError::TooLarge(written));
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(Self { temp_dir, file_path })
    }

    pub async fn into_bytes(self) -> Result<Bytes, FetchError> {
        let bytes = tokio::fs::read(&self.file_path).await?;
        self.temp_dir.close()?;
        Ok(bytes.into())
    }
}

fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let name = name.trim_start_matches('.');
    if name.is_empty() { "download".into() } else { name.into() }
}

async fn download_to_memory<S, E>(
    filename: &str,
    stream: S,
    max_size: u64,
) -> Result<Bytes, FetchError>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    FetchError: From<E>,
{
    ScopedDownload::from_stream(&std::env::temp_dir(), filename, stream, max_size)
        .await?
        .into_bytes()
        .await
}

pub struct TelegramImageFetcher {
    telegram: Bot,
    http_client: reqwest::Client,
}

impl TelegramImageFetcher {
    pub const fn new(telegram: Bot, http_client: reqwest::Client) -> Self {
        Self { telegram, http_client }
    }
}

#[async_trait]
impl ImageFetcher for TelegramImageFetcher {
    async fn fetch_chat_file(&self, file_id: &FileId) -> Result<Bytes, FetchError> {
        let file = self.telegram.get_file(file_id.clone()).send().await?;

        let size = u64::from(file.meta.size);
        if size > MAX_CHAT_FILE_SIZE {
            return Err(FetchError::TooLarge(size));
        }

        if file.path.is_empty() {
            return Err(FetchError::Expired);
        }

        let stream = self.telegram.download_file_stream(&file.path);
        download_to_memory(&file.path, stream, MAX_CHAT_FILE_SIZE).await
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        if let Some(length) = response.content_length().filter(|length| *length > MAX_RESULT_SIZE)
        {
            return Err(FetchError::TooLarge(length));
        }

        let filename = response
            .url()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        download_to_memory(&filename, response.bytes_stream(), MAX_RESULT_SIZE).await
    }
}
