use std::io::Cursor;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::StatusCode;
use serde_json::{Value, json};
use teloxide::ApiError;
use teloxide::types::{
    CallbackQuery, ChatAction, ChatId, FileId, InlineKeyboardButtonKind, InlineKeyboardMarkup,
    Message, MessageId, PhotoSize,
};

use super::bot_state::BotState;
use super::command_context::CommandContext;
use super::config::Config;
use super::telegram_utils::CompactUser;
use crate::apis::telegram::{ReplyTarget, TelegramApi, TelegramError, TelegramResult};
use crate::editing::acquirer::{FetchError, ImageFetcher, SourceImage};
use crate::editing::invoker::{
    GenerationError, GenerationRequest, GenerationResult, ImageProvider, InlineError, Providers,
};
use crate::editing::mask::MaskArtifact;
use crate::editing::result_relay::ChatSink;
use crate::editing::transport::{Relay, RelayError, UploadArtifact};
use crate::editing::variant::ProviderKind;

const SENT_AT: i64 = 1_700_000_000;

pub fn jpeg(width: u32, height: u32) -> Bytes {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    buffer.into_inner().into()
}

fn photo_size_json(width: u32, height: u32) -> Value {
    json!({
        "file_id": format!("file_{width}x{height}"),
        "file_unique_id": format!("unique_{width}x{height}"),
        "file_size": width * height / 10,
        "width": width,
        "height": height,
    })
}

pub fn photo_size(width: u32, height: u32) -> PhotoSize {
    serde_json::from_value(photo_size_json(width, height)).unwrap()
}

pub fn source_image(width: u32, height: u32) -> SourceImage {
    SourceImage {
        file_unique_id: format!("unique_{width}x{height}"),
        bytes: Bytes::from_static(b"jpeg bytes"),
        width,
        height,
    }
}

fn user_json(user_id: u64) -> Value {
    json!({"id": user_id, "is_bot": false, "first_name": "Ann"})
}

/// a message from `user_id` in their private chat, without content
fn message_json(user_id: u64) -> Value {
    json!({
        "message_id": 1,
        "date": SENT_AT,
        "chat": {"id": user_id, "type": "private", "first_name": "Ann"},
        "from": user_json(user_id),
    })
}

pub fn message_from(value: Value) -> Message {
    serde_json::from_value(value).unwrap()
}

pub fn text_message(user_id: u64, text: &str) -> Message {
    let mut value = message_json(user_id);
    value["text"] = json!(text);
    message_from(value)
}

/// a text starting with a bot command `command_length` UTF-16 units long
pub fn command_message_json(user_id: u64, text: &str, command_length: usize) -> Value {
    let mut value = message_json(user_id);
    value["text"] = json!(text);
    value["entities"] = json!([{"type": "bot_command", "offset": 0, "length": command_length}]);
    value
}

pub fn command_message(user_id: u64, text: &str, command_length: usize) -> Message {
    message_from(command_message_json(user_id, text, command_length))
}

pub fn photo_message(user_id: u64, caption: Option<&str>) -> Message {
    let mut value = message_json(user_id);
    value["photo"] = json!([photo_size_json(90, 72), photo_size_json(1000, 800)]);
    if let Some(caption) = caption {
        value["caption"] = json!(caption);
    }
    message_from(value)
}

/// `user_id` pressing a button of the bot's menu message in chat `chat_id`
pub fn callback_query(user_id: u64, chat_id: u64, data: &str) -> CallbackQuery {
    let mut menu = message_json(chat_id);
    menu["message_id"] = json!(2);
    menu["from"] = json!({"id": 99, "is_bot": true, "first_name": "Retouch"});
    menu["text"] = json!("how should this photo be edited?");

    serde_json::from_value(json!({
        "id": "4382",
        "from": user_json(user_id),
        "chat_instance": "-1",
        "message": menu,
        "data": data,
    }))
    .unwrap()
}

pub fn config() -> Config {
    Config::from_lookup(|name| match name {
        "TELEGRAM_TOKEN" => Some("123:test".into()),
        "REPLICATE_API_TOKEN" => Some("r8_test".into()),
        "OPENAI_API_KEY" => Some("sk-test".into()),
        _ => None,
    })
    .unwrap()
}

pub fn bot_state() -> Arc<BotState> {
    Arc::new(BotState::new(config()).unwrap())
}

/// bot state whose remote services are all fakes
pub struct TestBot {
    pub state: Arc<BotState>,
    pub telegram: Arc<FakeTelegram>,
    pub fetcher: Arc<FakeFetcher>,
    pub provider: Arc<FakeProvider>,
    pub relay: Arc<FakeRelay>,
}

impl TestBot {
    /// `provider` serves every variant
    pub fn new(fetcher: FakeFetcher, provider: FakeProvider, relay: FakeRelay) -> Self {
        let telegram = Arc::new(FakeTelegram::default());
        let fetcher = Arc::new(fetcher);
        let provider = Arc::new(provider);
        let relay = Arc::new(relay);

        let mut state = BotState::new(config()).unwrap();
        state.api = telegram.clone();
        state.fetcher = fetcher.clone();
        state.relay = relay.clone();
        state.providers = Providers::default()
            .with(ProviderKind::Replicate, provider.clone())
            .with(ProviderKind::OpenAi, provider.clone());

        Self { state: Arc::new(state), telegram, fetcher, provider, relay }
    }

    /// accepts inline uploads and has the photo from `photo_message` to hand out
    pub fn serving_photos() -> Self {
        Self::new(
            FakeFetcher::with_chat_file(jpeg(1000, 800)),
            FakeProvider::accepting(),
            FakeRelay::serving("https://relay.test/unique_1000x800.jpg"),
        )
    }

    pub fn context(&self, message: Message) -> CommandContext {
        let user = CompactUser::from(message.from.as_ref().unwrap());
        CommandContext::new(message, user, self.state.clone())
    }
}

/// an outgoing Bot API call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Keyboard { text: String, buttons: Vec<String> },
    Photo(Bytes),
    Edit(String),
    Delete(MessageId),
    Action,
    Answer(Option<String>),
}

#[derive(Default)]
pub struct FakeTelegram {
    sent: Mutex<Vec<Sent>>,
    next_message_id: AtomicI32,
}

impl FakeTelegram {
    /// message ids handed out for replies start at 100
    pub const FIRST_MESSAGE_ID: MessageId = MessageId(100);

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(text) | Sent::Keyboard { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn photos(&self) -> usize {
        self.sent().iter().filter(|sent| matches!(sent, Sent::Photo(_))).count()
    }
}

fn callback_data(reply_markup: &InlineKeyboardMarkup) -> Vec<String> {
    reply_markup
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl TelegramApi for FakeTelegram {
    async fn reply_text(
        &self,
        _: ReplyTarget,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<MessageId> {
        self.push(match reply_markup {
            Some(reply_markup) => Sent::Keyboard { text, buttons: callback_data(&reply_markup) },
            None => Sent::Text(text),
        });

        let offset = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageId(Self::FIRST_MESSAGE_ID.0 + offset))
    }

    async fn reply_photo(&self, _: ReplyTarget, photo: Bytes) -> TelegramResult<()> {
        self.push(Sent::Photo(photo));
        Ok(())
    }

    async fn edit_text(&self, _: ChatId, _: MessageId, text: String) -> TelegramResult<()> {
        self.push(Sent::Edit(text));
        Ok(())
    }

    async fn delete(&self, _: ChatId, message_id: MessageId) -> TelegramResult<()> {
        self.push(Sent::Delete(message_id));
        Ok(())
    }

    async fn chat_action(&self, _: ReplyTarget, _: ChatAction) -> TelegramResult<()> {
        self.push(Sent::Action);
        Ok(())
    }

    async fn answer_query(&self, _: &CallbackQuery, text: Option<String>) -> TelegramResult<()> {
        self.push(Sent::Answer(text));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    chat_file: Option<Bytes>,
    url_body: Option<Bytes>,
    chat_file_calls: AtomicUsize,
    url_calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_chat_file(bytes: Bytes) -> Self {
        Self { chat_file: Some(bytes), ..Self::default() }
    }

    pub fn with_url_body(self, bytes: Bytes) -> Self {
        Self { url_body: Some(bytes), ..self }
    }

    pub fn chat_file_calls(&self) -> usize {
        self.chat_file_calls.load(Ordering::SeqCst)
    }

    pub fn url_calls(&self) -> usize {
        self.url_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch_chat_file(&self, _: &FileId) -> Result<Bytes, FetchError> {
        self.chat_file_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_file.clone().ok_or(FetchError::Expired)
    }

    async fn fetch_url(&self, _: &str) -> Result<Bytes, FetchError> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);
        self.url_body.clone().ok_or(FetchError::Expired)
    }
}

#[derive(Clone, Default)]
struct RecordedRequest {
    prompt: String,
    source: Option<UploadArtifact>,
    mask: Option<MaskArtifact>,
}

pub struct FakeProvider {
    refuse_inline: bool,
    inline_failure: Option<StatusCode>,
    result: GenerationResult,
    failure: Option<StatusCode>,
    stall: bool,
    inline_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    last_request: Mutex<Option<RecordedRequest>>,
}

impl FakeProvider {
    pub fn accepting() -> Self {
        Self {
            refuse_inline: false,
            inline_failure: None,
            result: GenerationResult::ResultBytes(Bytes::from_static(b"generated png")),
            failure: None,
            stall: false,
            inline_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn refusing() -> Self {
        Self { refuse_inline: true, ..Self::accepting() }
    }

    pub fn returning(self, result: GenerationResult) -> Self {
        Self { result, ..self }
    }

    pub fn failing_with(self, status: StatusCode) -> Self {
        Self { failure: Some(status), ..self }
    }

    /// passes the local check but fails requests carrying inline bytes
    pub fn rejecting_inline_with(self, status: StatusCode) -> Self {
        Self { inline_failure: Some(status), ..self }
    }

    pub fn stalling(self) -> Self {
        Self { stall: true, ..self }
    }

    pub fn inline_calls(&self) -> usize {
        self.inline_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn last_source(&self) -> Option<UploadArtifact> {
        self.last_request()?.source
    }

    pub fn last_mask(&self) -> Option<MaskArtifact> {
        self.last_request()?.mask
    }

    pub fn last_prompt(&self) -> Option<String> {
        Some(self.last_request()?.prompt)
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn accept_inline(&self, image: &[u8]) -> Result<(), InlineError> {
        self.inline_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_inline {
            return Err(InlineError::TooLarge { size: image.len(), limit: 0 });
        }

        Ok(())
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GenerationResult, GenerationError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let inline = matches!(request.source, Some(UploadArtifact::InlineBytes(_)));
        *self.last_request.lock().unwrap() = Some(RecordedRequest {
            prompt: request.prompt.into(),
            source: request.source,
            mask: request.mask.cloned(),
        });

        if self.stall {
            std::future::pending::<()>().await;
        }

        let failure = self.failure.or(self.inline_failure.filter(|_| inline));
        if let Some(status) = failure {
            return Err(GenerationError::Status {
                status,
                body: r#"{"detail": "the request was rejected"}"#.into(),
            });
        }

        Ok(self.result.clone())
    }
}

pub struct FakeRelay {
    response: Result<String, StatusCode>,
    put_calls: AtomicUsize,
    last_filename: Mutex<Option<String>>,
}

impl FakeRelay {
    pub fn serving(url: &str) -> Self {
        Self {
            response: Ok(url.into()),
            put_calls: AtomicUsize::new(0),
            last_filename: Mutex::new(None),
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self { response: Err(status), ..Self::serving("") }
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn last_filename(&self) -> Option<String> {
        self.last_filename.lock().unwrap().clone()
    }
}

#[async_trait]
impl Relay for FakeRelay {
    async fn put(&self, filename: &str, _: Bytes) -> Result<String, RelayError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filename.lock().unwrap() = Some(filename.into());
        self.response.clone().map_err(RelayError::Status)
    }
}

#[derive(Default)]
pub struct FakeChat {
    reject_photos: bool,
    photo_delay: Option<Duration>,
    photos: Mutex<Vec<Bytes>>,
    texts: Mutex<Vec<String>>,
}

impl FakeChat {
    pub fn rejecting_photos() -> Self {
        Self { reject_photos: true, ..Self::default() }
    }

    pub fn slow_photos(delay: Duration) -> Self {
        Self { photo_delay: Some(delay), ..Self::default() }
    }

    pub fn photos(&self) -> Vec<Bytes> {
        self.photos.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for FakeChat {
    async fn send_photo(&self, image: Bytes) -> Result<(), TelegramError> {
        if let Some(delay) = self.photo_delay {
            tokio::time::sleep(delay).await;
        }

        if self.reject_photos {
            return Err(TelegramError::Api(ApiError::Unknown(
                "Bad Request: IMAGE_PROCESS_FAILED".into(),
            )));
        }

        self.photos.lock().unwrap().push(image);
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<(), TelegramError> {
        self.texts.lock().unwrap().push(text);
        Ok(())
    }
}
