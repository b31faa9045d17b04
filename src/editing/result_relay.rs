use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use super::acquirer::{FetchError, ImageFetcher};
use super::invoker::GenerationResult;
use crate::apis::telegram::TelegramError;

#[derive(Debug)]
pub enum DeliveryError {
    Download(FetchError),
    Rejected(TelegramError),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download(err) => write!(f, "downloading the result failed: {err}"),
            Self::Rejected(err) => write!(f, "sending the result failed: {err}"),
        }
    }
}

/// the chat session a flow reports back to
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_photo(&self, image: Bytes) -> Result<(), TelegramError>;
    async fn send_text(&self, text: String) -> Result<(), TelegramError>;
}

pub async fn relay_result(
    fetcher: &dyn ImageFetcher,
    chat: &dyn ChatSink,
    result: GenerationResult,
) -> Result<(), DeliveryError> {
    let image = match result {
        GenerationResult::ResultBytes(bytes) => bytes,
        GenerationResult::ResultUrl(url) => {
            log::debug!("downloading result from {url}");
            fetcher.fetch_url(&url).await.map_err(DeliveryError::Download)?
        }
    };

    log::debug!("sending result ({} bytes)", image.len());
    chat.send_photo(image).await.map_err(DeliveryError::Rejected)
}
