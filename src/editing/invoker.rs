use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use super::mask::MaskArtifact;
use super::transport::UploadArtifact;
use super::variant::{GenerationVariant, ProviderKind};
use crate::utilities::api_utils::ServerError;
use crate::utilities::text_utils::TruncateWithEllipsis;

/// why a raw image payload did not reach the provider
#[derive(Debug)]
pub enum InlineError {
    TooLarge { size: usize, limit: usize },
    UnsupportedFormat,
    /// the inline request failed in transfer or was refused by the provider
    Rejected(GenerationError),
}

impl fmt::Display for InlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { size, limit } => {
                write!(f, "payload of {size} bytes exceeds the inline limit of {limit} bytes")
            }
            Self::UnsupportedFormat => write!(f, "unsupported image format"),
            Self::Rejected(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug)]
pub enum GenerationError {
    MissingSource,
    MissingMask,
    ProviderUnavailable(ProviderKind),
    UnsupportedVariant(GenerationVariant),
    Request(reqwest::Error),
    Server(StatusCode),
    Status { status: StatusCode, body: String },
    Failed(String),
    NoOutput,
    Encoding(image::ImageError),
}

impl GenerationError {
    /// a failure a relayed URL can get past
    pub fn rejects_inline(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => matches!(
                *status,
                StatusCode::BAD_REQUEST
                    | StatusCode::PAYLOAD_TOO_LARGE
                    | StatusCode::UNPROCESSABLE_ENTITY
            ),
            _ => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSource => "this mode needs a photo.".into(),
            Self::MissingMask => "this mode needs a mask, which could not be prepared.".into(),
            Self::ProviderUnavailable(provider) => {
                format!("{provider} is not configured on this bot.")
            }
            Self::UnsupportedVariant(variant) => format!("{variant} is not supported here."),
            Self::Request(_) => "the image service could not be reached.".into(),
            Self::Server(status) => {
                format!("the image service is currently offline ({status}).")
            }
            Self::Status { status, body } => format!(
                "the image service rejected the request ({status}): {}",
                summarize_body(body)
            ),
            Self::Failed(reason) => {
                format!("the generation failed: {}", reason.clone().truncate_with_ellipsis(200))
            }
            Self::NoOutput => "the image service returned no image.".into(),
            Self::Encoding(_) => "the image could not be prepared for the image service.".into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource => write!(f, "source image missing"),
            Self::MissingMask => write!(f, "mask missing"),
            Self::ProviderUnavailable(provider) => write!(f, "{provider} is not configured"),
            Self::UnsupportedVariant(variant) => write!(f, "{variant:?} is not supported"),
            Self::Request(err) => write!(f, "request failed: {err}"),
            Self::Server(status) => write!(f, "server error {status}"),
            Self::Status { status, body } => write!(f, "{status}: {body}"),
            Self::Failed(reason) => write!(f, "generation failed: {reason}"),
            Self::NoOutput => write!(f, "no output"),
            Self::Encoding(err) => write!(f, "encoding failed: {err}"),
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.without_url())
    }
}

impl From<ServerError> for GenerationError {
    fn from(value: ServerError) -> Self {
        Self::Server(value.0)
    }
}

impl From<image::ImageError> for GenerationError {
    fn from(value: image::ImageError) -> Self {
        Self::Encoding(value)
    }
}

/// pulls the `error.message` out of JSON error bodies
fn summarize_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.pointer("/detail"))
                .or_else(|| value.pointer("/error"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
        .truncate_with_ellipsis(200)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationResult {
    ResultBytes(Bytes),
    ResultUrl(String),
}

pub struct GenerationRequest<'a> {
    pub variant: GenerationVariant,
    pub prompt: &'a str,
    pub source: Option<UploadArtifact>,
    pub mask: Option<&'a MaskArtifact>,
}

impl GenerationRequest<'_> {
    #[must_use]
    pub fn with_source(&self, source: UploadArtifact) -> Self {
        Self { variant: self.variant, prompt: self.prompt, source: Some(source), mask: self.mask }
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn accept_inline(&self, image: &[u8]) -> Result<(), InlineError>;

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationResult, GenerationError>;
}

#[derive(Default)]
pub struct Providers {
    providers: HashMap<ProviderKind, Arc<dyn ImageProvider>>,
}

impl Providers {
    #[must_use]
    pub fn with(mut self, kind: ProviderKind, provider: Arc<dyn ImageProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&dyn ImageProvider> {
        self.providers.get(&kind).map(AsRef::as_ref)
    }

    pub fn supports(&self, variant: GenerationVariant) -> bool {
        self.providers.contains_key(&variant.spec().provider)
    }
}

pub async fn generate(
    provider: &dyn ImageProvider,
    request: GenerationRequest<'_>,
) -> Result<GenerationResult, GenerationError> {
    let spec = request.variant.spec();

    if spec.requires_source && request.source.is_none() {
        return Err(GenerationError::MissingSource);
    }

    if spec.requires_mask && request.mask.is_none() {
        return Err(GenerationError::MissingMask);
    }

    let transport = match &request.source {
        Some(UploadArtifact::InlineBytes(_)) => "inline bytes",
        Some(UploadArtifact::RemoteUrl(_)) => "relay URL",
        None => "no source",
    };
    log::info!("generating with {} on {} ({transport})", spec.model, provider.name());

    let result = provider.generate(request).await;
    if let Err(err) = &result {
        log::error!("{} generation failed: {err}", provider.name());
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::editing::mask::CoverageRatio;
    use crate::utilities::test_fixtures::FakeProvider;

    #[tokio::test]
    async fn test_mask_variant_without_mask_fails_fast() {
        let provider = FakeProvider::accepting();

        let result = generate(
            &provider,
            GenerationRequest {
                variant: GenerationVariant::DallEEdit,
                prompt: "add blinds",
                source: Some(UploadArtifact::InlineBytes(Bytes::from_static(b"image"))),
                mask: None,
            },
        )
        .await;

        assert!(matches!(result, Err(GenerationError::MissingMask)));
        assert_eq!(provider.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_source_variant_without_source_fails_fast() {
        let provider = FakeProvider::accepting();

        let result = generate(
            &provider,
            GenerationRequest {
                variant: GenerationVariant::FluxKontext,
                prompt: "add blinds",
                source: None,
                mask: None,
            },
        )
        .await;

        assert!(matches!(result, Err(GenerationError::MissingSource)));
        assert_eq!(provider.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_mask_variant_with_mask_reaches_provider() {
        let provider = FakeProvider::accepting();
        let mask = MaskArtifact::build(100, 100, CoverageRatio::default());

        let result = generate(
            &provider,
            GenerationRequest {
                variant: GenerationVariant::DallEEdit,
                prompt: "add blinds",
                source: Some(UploadArtifact::RemoteUrl("https://relay.test/a.jpg".into())),
                mask: Some(&mask),
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(provider.generate_calls(), 1);
        assert_eq!(
            provider.last_source(),
            Some(UploadArtifact::RemoteUrl("https://relay.test/a.jpg".into()))
        );
    }

    #[tokio::test]
    async fn test_prompt_only_variant() {
        let provider = FakeProvider::accepting();

        let result = generate(
            &provider,
            GenerationRequest {
                variant: GenerationVariant::DallEGenerate,
                prompt: "a lighthouse at dusk",
                source: None,
                mask: None,
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(provider.generate_calls(), 1);
    }

    #[test]
    fn test_status_error_summary() {
        let err = GenerationError::Status {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error": {"message": "Invalid mask size", "type": "invalid_request_error"}}"#
                .into(),
        };
        assert_eq!(
            err.user_message(),
            "the image service rejected the request (400 Bad Request): Invalid mask size"
        );

        let err = GenerationError::Status {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: r#"{"detail": "input_image is required", "status": 422}"#.into(),
        };
        assert!(err.user_message().ends_with(": input_image is required"));

        let err = GenerationError::Status {
            status: StatusCode::FORBIDDEN,
            body: "  forbidden\n".into(),
        };
        assert!(err.user_message().ends_with(": forbidden"));
    }

    #[test]
    fn test_inline_rejections() {
        let status = |status| GenerationError::Status { status, body: String::new() };

        assert!(status(StatusCode::PAYLOAD_TOO_LARGE).rejects_inline());
        assert!(status(StatusCode::BAD_REQUEST).rejects_inline());
        assert!(status(StatusCode::UNPROCESSABLE_ENTITY).rejects_inline());
        assert!(!status(StatusCode::UNAUTHORIZED).rejects_inline());
        assert!(!GenerationError::Server(StatusCode::BAD_GATEWAY).rejects_inline());
        assert!(!GenerationError::Failed("NSFW content detected".into()).rejects_inline());
    }

    #[test]
    fn test_providers_lookup() {
        let providers = Providers::default()
            .with(ProviderKind::Replicate, Arc::new(FakeProvider::accepting()));

        assert!(providers.supports(GenerationVariant::FluxKontext));
        assert!(!providers.supports(GenerationVariant::DallEEdit));
        assert!(providers.get(ProviderKind::OpenAi).is_none());
    }
}
