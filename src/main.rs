use std::process;

use bot::Bot;
use utilities::bot_state::BotState;
use utilities::config::Config;
use utilities::logchamp;

mod apis;
mod bot;
mod commands;
mod editing;
mod not_commands;
mod utilities;

fn exit_with(message: &str) -> ! {
    log::error!("{message}");
    log::logger().flush();
    process::exit(1);
}

#[tokio::main]
async fn main() {
    if let Err(err) = logchamp::init() {
        eprintln!("failed to initialize logging: {err}");
    }
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => exit_with(&format!("invalid configuration: {err}")),
    };

    let state = match BotState::new(config) {
        Ok(state) => state,
        Err(err) => exit_with(&format!("failed to create the HTTP client: {err}")),
    };

    let mut bot = Bot::new(state);

    bot.add_command(commands::start::Start);
    bot.add_command(commands::ping::Ping);
    bot.add_command(commands::generate::Generate);
    bot.add_command(commands::cancel::Cancel);

    bot.run().await;
}
