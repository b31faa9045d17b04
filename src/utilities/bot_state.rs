use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, redirect};
use teloxide::Bot;

use super::config::Config;
use super::rate_limit::RateLimits;
use super::telegram_utils::CompactUser;
use crate::apis::openai::OpenAi;
use crate::apis::relay::TransferSh;
use crate::apis::replicate::Replicate;
use crate::apis::telegram::TelegramApi;
use crate::editing::acquirer::{ImageFetcher, TelegramImageFetcher};
use crate::editing::invoker::Providers;
use crate::editing::session::SessionStore;
use crate::editing::tasks::FlowRegistry;
use crate::editing::transport::Relay;
use crate::editing::variant::ProviderKind;

pub struct BotState {
    pub config: Config,
    /// polling, `getMe` and command sync
    pub telegram: Bot,
    /// messages sent while serving a user
    pub api: Arc<dyn TelegramApi>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub providers: Providers,
    pub relay: Arc<dyn Relay>,
    pub sessions: SessionStore,
    pub flows: Arc<FlowRegistry>,
    pub rate_limits: Mutex<RateLimits>,
    pub me: Mutex<Option<CompactUser>>,
}

impl BotState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let mut http_client = Client::builder();

        if let Some(user_agent) = &config.user_agent {
            http_client = http_client.user_agent(user_agent);
        }

        let http_client = http_client
            .redirect(redirect::Policy::limited(5))
            .timeout(Duration::from_secs(60))
            .build()?;

        let telegram = Bot::with_client(config.telegram_token.clone(), http_client.clone());

        let mut providers = Providers::default().with(
            ProviderKind::Replicate,
            Arc::new(Replicate::new(http_client.clone(), &config.replicate_api_token)),
        );

        if let Some(api_key) = &config.openai_api_key {
            let openai = OpenAi::new(http_client.clone(), api_key);
            providers = providers.with(ProviderKind::OpenAi, Arc::new(openai));
        } else {
            log::warn!("OPENAI_API_KEY is not set, DALL·E variants are disabled");
        }

        log::debug!(
            "mask ratio {}, flow timeout {:?}, session ttl {:?}, relay {}",
            config.mask_ratio,
            config.flow_timeout,
            config.session_ttl,
            config.relay_url
        );

        Ok(Self {
            api: Arc::new(telegram.clone()),
            fetcher: Arc::new(TelegramImageFetcher::new(telegram.clone(), http_client.clone())),
            relay: Arc::new(TransferSh::new(http_client, config.relay_url.clone())),
            sessions: SessionStore::new(config.session_ttl),
            flows: Arc::new(FlowRegistry::default()),
            rate_limits: Mutex::new(RateLimits::default()),
            me: Mutex::new(None),
            telegram,
            providers,
            config,
        })
    }
}
