use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageResult, Rgba, RgbaImage};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::editing::invoker::{
    GenerationError, GenerationRequest, GenerationResult, ImageProvider, InlineError,
};
use crate::editing::mask::{EDITABLE, MaskArtifact};
use crate::editing::transport::UploadArtifact;
use crate::editing::variant::{GenerationVariant, VariantSpec};
use crate::utilities::api_utils::DetectServerError;

const API_BASE: &str = "https://api.openai.com/v1";
const UPLOAD_LIMIT: usize = 4 * 1024 * 1024;

#[derive(Serialize)]
struct GenerationsRequest<'a> {
    model: &'static str,
    prompt: &'a str,
    n: u8,
    size: Option<&'static str>,
    quality: Option<&'static str>,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

impl ImageData {
    fn into_result(self) -> Result<GenerationResult, GenerationError> {
        if let Some(b64_json) = self.b64_json {
            let image = BASE64
                .decode(b64_json)
                .map_err(|err| GenerationError::Failed(format!("invalid image data: {err}")))?;
            return Ok(GenerationResult::ResultBytes(image.into()));
        }

        self.url.map(GenerationResult::ResultUrl).ok_or(GenerationError::NoOutput)
    }
}

impl ImagesResponse {
    fn into_result(self) -> Result<GenerationResult, GenerationError> {
        self.data.into_iter().next().ok_or(GenerationError::NoOutput)?.into_result()
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

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (width, height) = size.split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

/// DALL·E masks mark editable pixels as fully transparent
fn alpha_mask(mask: &MaskArtifact, width: u32, height: u32) -> RgbaImage {
    let scaled = imageops::resize(&mask.rasterize(), width, height, FilterType::Nearest);

    RgbaImage::from_fn(width, height, |x, y| {
        if scaled.get_pixel(x, y).0[0] == EDITABLE {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

fn encode_png(image: DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn png_part(png: Vec<u8>, file_name: &'static str) -> reqwest::Result<Part> {
    Part::bytes(png).file_name(file_name).mime_str("image/png")
}

pub struct OpenAi {
    http_client: reqwest::Client,
    api_key: String,
}

impl OpenAi {
    pub fn new(http_client: reqwest::Client, api_key: &str) -> Self {
        Self { http_client, api_key: api_key.into() }
    }

    /// dall-e-2 edits only take file uploads, so relayed sources are fetched back
    async fn source_bytes(&self, source: UploadArtifact) -> Result<Bytes, GenerationError> {
        match source {
            UploadArtifact::InlineBytes(image) => Ok(image),
            UploadArtifact::RemoteUrl(url) => {
                let response = self.http_client.get(url).send().await?.server_error()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(GenerationError::Status { status, body: response.text().await? });
                }

                Ok(response.bytes().await?)
            }
        }
    }

    async fn edit(
        &self,
        spec: &VariantSpec,
        prompt: &str,
        source: Bytes,
        mask: &MaskArtifact,
    ) -> Result<GenerationResult, GenerationError> {
        let size = spec.size.unwrap_or("1024x1024");
        let (width, height) = parse_size(size)
            .ok_or_else(|| GenerationError::Failed(format!("invalid image size {size}")))?;

        let image = image::load_from_memory(&source)?.resize_exact(
            width,
            height,
            FilterType::Lanczos3,
        );
        let image = encode_png(image)?;
        if image.len() > UPLOAD_LIMIT {
            return Err(GenerationError::Failed("the image is too detailed to upload".into()));
        }
        let mask = encode_png(DynamicImage::ImageRgba8(alpha_mask(mask, width, height)))?;

        let form = Form::new()
            .text("model", spec.model)
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .text("size", size)
            .text("response_format", "b64_json")
            .part("image", png_part(image, "image.png")?)
            .part("mask", png_part(mask, "mask.png")?);

        let response = self
            .http_client
            .post(format!("{API_BASE}/images/edits"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        parse_response::<ImagesResponse>(response).await?.into_result()
    }

    async fn create(
        &self,
        spec: &VariantSpec,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let response = self
            .http_client
            .post(format!("{API_BASE}/images/generations"))
            .bearer_auth(&self.api_key)
            .json(&GenerationsRequest {
                model: spec.model,
                prompt,
                n: 1,
                size: spec.size,
                quality: spec.quality,
                response_format: "url",
            })
            .send()
            .await?;

        parse_response::<ImagesResponse>(response).await?.into_result()
    }
}

#[async_trait]
impl ImageProvider for OpenAi {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn accept_inline(&self, image: &[u8]) -> Result<(), InlineError> {
        if image.len() > UPLOAD_LIMIT {
            return Err(InlineError::TooLarge { size: image.len(), limit: UPLOAD_LIMIT });
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
        let spec = request.variant.spec();

        match request.variant {
            GenerationVariant::DallEEdit => {
                let source = request.source.ok_or(GenerationError::MissingSource)?;
                let mask = request.mask.ok_or(GenerationError::MissingMask)?;
                let source = self.source_bytes(source).await?;
                self.edit(spec, request.prompt, source, mask).await
            }
            GenerationVariant::DallEGenerate => self.create(spec, request.prompt).await,
            variant @ GenerationVariant::FluxKontext => {
                Err(GenerationError::UnsupportedVariant(variant))
            }
        }
    }
}
