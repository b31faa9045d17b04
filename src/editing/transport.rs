use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use super::acquirer::SourceImage;
use super::flow::{FlowError, FlowState, FlowTracker};
use super::invoker::{self, GenerationRequest, GenerationResult, ImageProvider, InlineError};
use crate::utilities::api_utils::ServerError;

/// how the source image reaches the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadArtifact {
    InlineBytes(Bytes),
    RemoteUrl(String),
}

#[derive(Debug)]
pub enum RelayError {
    Request(reqwest::Error),
    Status(StatusCode),
    InvalidUrl(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(err) => write!(f, "relay request failed: {err}"),
            Self::Status(status) => write!(f, "relay responded with {status}"),
            Self::InvalidUrl(body) => write!(f, "relay returned an invalid URL: {body:?}"),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.without_url())
    }
}

impl From<ServerError> for RelayError {
    fn from(value: ServerError) -> Self {
        Self::Status(value.0)
    }
}

/// anonymous public file host
#[async_trait]
pub trait Relay: Send + Sync {
    async fn put(&self, filename: &str, image: Bytes) -> Result<String, RelayError>;
}

/// both the inline and the relay transfer failed
#[derive(Debug)]
pub struct UploadError {
    pub inline: InlineError,
    pub relay: RelayError,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inline upload failed ({}), relay upload failed ({})", self.inline, self.relay)
    }
}

/// Runs `request` with the source attached inline. If the provider refuses the payload up front,
/// rejects the inline request, or the transfer itself fails, the source is put on the relay once
/// and the request is repeated with its URL. There is no further fallback.
pub async fn deliver(
    provider: &dyn ImageProvider,
    relay: &dyn Relay,
    source: &SourceImage,
    request: GenerationRequest<'_>,
    tracker: &mut FlowTracker,
) -> Result<GenerationResult, FlowError> {
    let filename = source.relay_filename();
    tracker.transition(FlowState::Uploading);

    let inline = match provider.accept_inline(&source.bytes).await {
        Ok(()) => {
            log::debug!("{} accepts {filename} inline", provider.name());
            tracker.transition(FlowState::Generating);

            let inline_request =
                request.with_source(UploadArtifact::InlineBytes(source.bytes.clone()));
            match invoker::generate(provider, inline_request).await {
                Err(err) if err.rejects_inline() => InlineError::Rejected(err),
                result => return Ok(result?),
            }
        }
        Err(err) => err,
    };

    log::warn!("{} refused {filename} inline: {inline}; falling back to relay", provider.name());
    tracker.transition(FlowState::Uploading);

    let url = match relay.put(&filename, source.bytes.clone()).await {
        Ok(url) => url,
        Err(relay) => {
            log::error!("relay upload of {filename} failed: {relay}");
            return Err(UploadError { inline, relay }.into());
        }
    };
    log::info!("relayed {filename} to {url}");

    tracker.transition(FlowState::Generating);
    Ok(invoker::generate(provider, request.with_source(UploadArtifact::RemoteUrl(url))).await?)
}
