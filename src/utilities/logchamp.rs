//! joe: logchamp
//! joe: call it logchamp
//! joe: please

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Mutex;

use colored::{Color, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use time::macros;

const OWN_TARGET: &str = "retouch_bot";

struct Logger {
    file: Mutex<BufWriter<File>>,
}

impl Logger {
    fn new(filename: &str) -> io::Result<Self> {
        Ok(Self { file: Mutex::new(BufWriter::new(File::create(filename)?)) })
    }
}

/// debug output from the bot itself, info and above from dependencies
fn is_enabled(target: &str, level: Level) -> bool {
    match target.split("::").next() {
        Some(OWN_TARGET) => true,
        _ => level <= Level::Info,
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        is_enabled(metadata.target(), metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = time::OffsetDateTime::now_utc()
            .format(macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .unwrap_or_default();
        let target = record.target();
        let level = record.level().as_str();
        let args = record.args();

        let color = match record.level() {
            Level::Error => Color::BrightRed,
            Level::Warn => Color::BrightYellow,
            Level::Info => Color::BrightCyan,
            Level::Debug => Color::Magenta,
            Level::Trace => Color::Green,
        };

        println!("{} {} {args}", timestamp.color(Color::BrightBlack), level.color(color));
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "{timestamp} [{target} {level}] {args}").ok();
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            file.flush().ok();
        }
    }
}

pub fn init() -> io::Result<()> {
    log::set_boxed_logger(Box::new(Logger::new(".log")?)).map_err(io::Error::other)?;
    log::set_max_level(LevelFilter::Debug);
    Ok(())
}
