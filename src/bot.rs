use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future;
use teloxide::Bot as TelegramBot;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, BotCommand, Message, Update, UpdateKind};
use tokio::signal;
use tokio::task::JoinHandle;

use crate::apis::telegram::TelegramResult;
use crate::commands::CommandTrait;
use crate::not_commands::{photo, prompt, variant_choice};
use crate::utilities::bot_state::BotState;
use crate::utilities::command_dispatcher;
use crate::utilities::command_manager::CommandManager;
use crate::utilities::message_filters::{self, MessageDestination};
use crate::utilities::telegram_utils::CompactUser;

const POLL_TIMEOUT: u32 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy)]
enum BotStatus {
    Running,
    WaitingToClose,
}

pub struct Bot {
    state: Arc<BotState>,
    command_manager: CommandManager,
    status: BotStatus,
    tasks: Vec<JoinHandle<()>>,
    offset: i32,
}

impl Bot {
    pub fn new(state: BotState) -> Self {
        Self {
            state: Arc::new(state),
            command_manager: CommandManager::default(),
            status: BotStatus::Running,
            tasks: Vec::new(),
            offset: 0,
        }
    }

    pub async fn run(&mut self) {
        if let Err(err) = self.on_ready().await {
            log::error!("failed to initialize: {err}");
        }

        let sweeper = self.spawn_sweeper();

        while let BotStatus::Running = self.status {
            let telegram = self.state.telegram.clone();
            let offset = self.offset;

            let request = telegram
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT)
                .allowed_updates([AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let updates = tokio::select! {
                updates = request.send() => Some(updates),
                _ = signal::ctrl_c() => None,
            };

            match updates {
                Some(Ok(updates)) => {
                    for update in updates {
                        self.on_update(update);
                    }
                }
                Some(Err(err)) => {
                    log::error!("failed to receive updates: {err}");
                    tokio::select! {
                        () = tokio::time::sleep(RETRY_DELAY) => (),
                        _ = signal::ctrl_c() => self.on_ctrl_c(),
                    }
                }
                None => self.on_ctrl_c(),
            }

            self.tasks.retain(|task| !task.is_finished());
        }

        self.close().await;
        sweeper.abort();
    }

    fn on_ctrl_c(&mut self) {
        log::warn!("Ctrl+C received");
        self.status = BotStatus::WaitingToClose;
    }

    async fn close(&mut self) {
        let task_count = self.tasks.len();
        if task_count > 0 {
            log::info!("waiting for {task_count} task(s) to finish…");

            tokio::select! {
                _ = future::join_all(self.tasks.drain(..)) => (),
                _ = signal::ctrl_c() => log::warn!("Ctrl+C received again, aborting"),
            }
        }

        let aborted = self.state.flows.abort_all();
        if aborted > 0 {
            log::warn!("aborted {aborted} running edit(s)");
        }
    }

    fn run_task<T: Future<Output = ()> + Send + 'static>(&mut self, future: T) {
        self.tasks.push(tokio::spawn(future));
    }

    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let state = self.state.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = state.sessions.evict_expired();
                if evicted > 0 {
                    log::debug!("evicted {evicted} expired request(s)");
                }
            }
        })
    }

    async fn on_ready(&self) -> TelegramResult<()> {
        let me = CompactUser::from(&self.state.telegram.get_me().send().await?.user);
        log::info!("running as {me}");
        *self.state.me.lock().unwrap() = Some(me);

        Self::sync_commands(&self.state.telegram, self.command_manager.public_command_list()).await
    }

    fn on_update(&mut self, update: Update) {
        self.offset = self.offset.max(update.id.as_offset());

        match update.kind {
            UpdateKind::Message(message) => self.on_new_message(message),
            UpdateKind::CallbackQuery(query) => {
                self.run_task(variant_choice::variant_choice(self.state.clone(), query));
            }
            _ => (),
        }
    }

    fn on_new_message(&mut self, message: Message) {
        let Some(destination) =
            message_filters::message_destination(&self.command_manager, self.state.clone(), message)
        else {
            return;
        };

        match destination {
            MessageDestination::Command { command, arguments, context } => {
                self.run_task(command_dispatcher::dispatch_command(command, arguments, context));
            }
            MessageDestination::Photo { context } => self.run_task(photo::photo(context)),
            MessageDestination::Prompt { text, context } => {
                self.run_task(prompt::prompt(context, text));
            }
        }
    }

    pub fn add_command(&mut self, command: impl CommandTrait + Send + Sync + 'static) {
        self.command_manager.add_command(Box::new(command));
    }

    async fn sync_commands(
        telegram: &TelegramBot,
        commands: Vec<BotCommand>,
    ) -> TelegramResult<()> {
        let bot_commands = telegram.get_my_commands().send().await?;

        if commands == bot_commands {
            log::info!("commands already synced");
            return Ok(());
        }

        let commands_len = commands.len();
        telegram.set_my_commands(commands).send().await?;
        log::info!("synced {commands_len} commands");

        Ok(())
    }
}
