use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ImageFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::editing::invoker::{
    GenerationError, GenerationRequest, GenerationResult, ImageProvider, InlineError,
};
use crate::editing::transport::UploadArtifact;
use crate::editing::variant::GenerationVariant;
use crate::utilities::api_utils::DetectServerError;

const API_BASE: &str = "https://api.replicate.com/v1";
const INLINE_LIMIT: usize = 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct CreatePrediction<'a> {
    input: Input<'a>,
}

#[derive(Serialize)]
struct Input<'a> {
    prompt: &'a str,
    input_image: &'a str,
    output_format: &'static str,
    aspect_ratio: &'static str,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Status {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Output {
    Url(String),
    Urls(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct Urls {
    get: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    status: Status,
    output: Option<Output>,
    error: Option<String>,
    urls: Urls,
}

impl Prediction {
    const fn is_pending(&self) -> bool {
        matches!(self.status, Status::Starting | Status::Processing)
    }

    fn into_result(self) -> Result<GenerationResult, GenerationError> {
        match self.status {
            Status::Succeeded => {
                let url = match self.output {
                    Some(Output::Url(url)) => Some(url),
                    Some(Output::Urls(urls)) => urls.into_iter().next(),
                    None => None,
                };
                url.map(GenerationResult::ResultUrl).ok_or(GenerationError::NoOutput)
            }
            Status::Canceled => Err(GenerationError::Failed("prediction was canceled".into())),
            _ => Err(GenerationError::Failed(
                self.error.unwrap_or_else(|| format!("prediction ended as {:?}", self.status)),
            )),
        }
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GenerationError> {
    let response = response.server_error()?;
    let status = response.status();

    if status.is_success() {
        Ok(response.json().await?)
    } else {
        Err(GenerationError::Status { status, body: response.text().await? })
    }
}

/// `data:` URI accepted by Replicate in place of an image URL
fn data_uri(image: &[u8]) -> Option<String> {
    let format = image::guess_format(image).ok()?;
    matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)
        .then(|| format!("data:{};base64,{}", format.to_mime_type(), BASE64.encode(image)))
}

pub struct Replicate {
    http_client: reqwest::Client,
    api_token: String,
}

impl Replicate {
    pub fn new(http_client: reqwest::Client, api_token: &str) -> Self {
        Self { http_client, api_token: api_token.into() }
    }

    async fn create(&self, model: &str, input: Input<'_>) -> Result<Prediction, GenerationError> {
        let response = self
            .http_client
            .post(format!("{API_BASE}/models/{model}/predictions"))
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&CreatePrediction { input })
            .send()
            .await?;

        parse_response(response).await
    }

    async fn poll(&self, url: &str) -> Result<Prediction, GenerationError> {
        let response = self.http_client.get(url).bearer_auth(&self.api_token).send().await?;

        parse_response(response).await
    }
}

#[async_trait]
impl ImageProvider for Replicate {
    fn name(&self) -> &'static str {
        "Replicate"
    }

    async fn accept_inline(&self, image: &[u8]) -> Result<(), InlineError> {
        if image.len() > INLINE_LIMIT {
            return Err(InlineError::TooLarge { size: image.len(), limit: INLINE_LIMIT });
        }

        match image::guess_format(image) {
            Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) => Ok(()),
            _ => Err(InlineError::UnsupportedFormat),
        }
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationResult, GenerationError> {
        if request.variant != GenerationVariant::FluxKontext {
            return Err(GenerationError::UnsupportedVariant(request.variant));
        }

        let input_image = match request.source {
            Some(UploadArtifact::InlineBytes(image)) => {
                data_uri(&image).ok_or_else(|| GenerationError::Failed("unsupported image".into()))?
            }
            Some(UploadArtifact::RemoteUrl(url)) => url,
            None => return Err(GenerationError::MissingSource),
        };

        let input = Input {
            prompt: request.prompt,
            input_image: &input_image,
            output_format: "png",
            aspect_ratio: "match_input_image",
        };

        let mut prediction = self.create(request.variant.spec().model, input).await?;

        while prediction.is_pending() {
            tokio::time::sleep(POLL_INTERVAL).await;
            prediction = self.poll(&prediction.urls.get).await?;
        }

        prediction.into_result()
    }
}
