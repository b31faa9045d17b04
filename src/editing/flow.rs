use std::fmt;
use std::time::Duration;

use super::acquirer::{ImageFetcher, SourceImage};
use super::invoker::{self, GenerationError, GenerationRequest, GenerationResult, Providers};
use super::mask::{CoverageRatio, MaskArtifact};
use super::result_relay::{self, ChatSink, DeliveryError};
use super::transport::{self, Relay, UploadError};
use super::variant::GenerationVariant;
use crate::apis::telegram::TelegramError;
use crate::utilities::text_utils;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingSelection,
    Uploading,
    Generating,
    Delivering,
    Failed,
}

pub struct FlowTracker {
    user_id: u64,
    state: FlowState,
}

impl FlowTracker {
    pub const fn new(user_id: u64) -> Self {
        Self { user_id, state: FlowState::Idle }
    }

    pub fn transition(&mut self, state: FlowState) {
        log::debug!("flow of {}: {:?} -> {state:?}", self.user_id, self.state);
        self.state = state;
    }
}

#[derive(Debug)]
pub enum FlowError {
    Upload(UploadError),
    Generation(GenerationError),
    Delivery(DeliveryError),
    TimedOut(Duration),
}

impl FlowError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Upload(_) => {
                "the photo could not be passed to the image service, and the fallback upload \
                 failed too."
                    .into()
            }
            Self::Generation(err) => err.user_message(),
            Self::Delivery(DeliveryError::Download(_)) => {
                "the edited image could not be downloaded.".into()
            }
            Self::Delivery(DeliveryError::Rejected(TelegramError::Api(err))) => {
                format!("sending the edited image failed ({err}).")
            }
            Self::Delivery(DeliveryError::Rejected(_)) => "sending the edited image failed.".into(),
            Self::TimedOut(deadline) => format!(
                "the edit took longer than {} and was stopped.",
                text_utils::format_duration(deadline.as_secs())
            ),
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload(err) => write!(f, "{err}"),
            Self::Generation(err) => write!(f, "{err}"),
            Self::Delivery(err) => write!(f, "{err}"),
            Self::TimedOut(deadline) => write!(f, "timed out after {deadline:?}"),
        }
    }
}

impl From<UploadError> for FlowError {
    fn from(value: UploadError) -> Self {
        Self::Upload(value)
    }
}

impl From<GenerationError> for FlowError {
    fn from(value: GenerationError) -> Self {
        Self::Generation(value)
    }
}

impl From<DeliveryError> for FlowError {
    fn from(value: DeliveryError) -> Self {
        Self::Delivery(value)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FlowSettings {
    pub mask_ratio: CoverageRatio,
    pub deadline: Duration,
}

#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub fetcher: &'a dyn ImageFetcher,
    pub providers: &'a Providers,
    pub relay: &'a dyn Relay,
    pub chat: &'a dyn ChatSink,
}

#[derive(Clone, Debug)]
pub struct EditJob {
    pub variant: GenerationVariant,
    pub prompt: String,
    pub source: Option<SourceImage>,
}

/// uploads the source if the variant takes one and runs the generation
async fn generate(
    collaborators: Collaborators<'_>,
    settings: FlowSettings,
    job: EditJob,
    tracker: &mut FlowTracker,
) -> Result<GenerationResult, FlowError> {
    let spec = job.variant.spec();
    let provider = collaborators
        .providers
        .get(spec.provider)
        .ok_or(GenerationError::ProviderUnavailable(spec.provider))?;

    let request =
        GenerationRequest { variant: job.variant, prompt: &job.prompt, source: None, mask: None };

    match &job.source {
        Some(source) if spec.requires_source => {
            let mask = spec
                .requires_mask
                .then(|| MaskArtifact::build(source.width, source.height, settings.mask_ratio));
            let request = GenerationRequest { mask: mask.as_ref(), ..request };

            transport::deliver(provider, collaborators.relay, source, request, tracker).await
        }
        _ => {
            tracker.transition(FlowState::Generating);
            Ok(invoker::generate(provider, request).await?)
        }
    }
}

/// Runs one edit and reports a failure to the chat exactly once. The deadline bounds the upload
/// and the generation; once the result is being delivered the flow is left to finish.
pub async fn run(
    collaborators: Collaborators<'_>,
    settings: FlowSettings,
    user_id: u64,
    job: EditJob,
) -> Result<(), FlowError> {
    let mut tracker = FlowTracker::new(user_id);

    let generated = tokio::time::timeout(
        settings.deadline,
        generate(collaborators, settings, job, &mut tracker),
    )
    .await
    .unwrap_or(Err(FlowError::TimedOut(settings.deadline)));

    let result = match generated {
        Ok(generated) => {
            tracker.transition(FlowState::Delivering);
            result_relay::relay_result(collaborators.fetcher, collaborators.chat, generated)
                .await
                .map_err(FlowError::from)
        }
        Err(err) => Err(err),
    };

    match &result {
        Ok(()) => tracker.transition(FlowState::Idle),
        Err(err) => {
            tracker.transition(FlowState::Failed);
            log::warn!("flow of {user_id} failed: {err}");

            if let Err(err) = collaborators.chat.send_text(err.user_message()).await {
                log::error!("failed to report a flow error to {user_id}: {err}");
            }

            tracker.transition(FlowState::Idle);
        }
    }

    result
}
