//! Process-wide logger initialization for embedders of the profile-HMM engine.
//!
//! Mirrors the shape of a typical `env_logger` setup for a library-hosted
//! CLI: verbosity is given as an occurrence count (`-v`, `-vv`, ...), the
//! `PHMM_LOG` environment variable can override the level per-target, and
//! `Error` records are suffixed with their `file:line` origin.
use log::{Level, LevelFilter};
use env_logger::{Builder, Env, fmt::Color};
use std::io::Write;
use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global logger exactly once. Subsequent calls are no-ops.
///
/// `verbosity` follows the teacher's convention: `0` = warnings and errors
/// only, `1` = info, `2` = debug, `3+` = trace.
pub fn init_logger(verbosity: &u8) {
    INIT.get_or_init(|| {
        let log_level = u8_to_loglevel(*verbosity);
        let env = Env::default().filter("PHMM_LOG");

        Builder::new()
            .filter_level(log_level)
            .format(|buf, record| {
                let traceback = if record.level() == Level::Error {
                    format!("(@ {}:{}) ", record.file().unwrap_or("unknown"), record.line().unwrap_or(0))
                } else {
                    String::new()
                };

                let mut level_style = buf.style();
                let color = match record.level() {
                    Level::Error => Color::Red,
                    Level::Warn  => Color::Yellow,
                    Level::Info  => Color::Green,
                    Level::Debug => Color::Blue,
                    Level::Trace => Color::Cyan,
                };
                level_style.set_color(color).set_bold(true);

                writeln!(
                    buf,
                    "[{} {: <5} {}] {traceback}{}",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                    level_style.value(record.level()),
                    record.target(),
                    record.args()
                )
            })
            .parse_env(env)
            .init();
    });
}

fn u8_to_loglevel(verbosity: u8) -> LevelFilter {
    match verbosity {
        0            => LevelFilter::Warn,
        1            => LevelFilter::Info,
        2            => LevelFilter::Debug,
        3..=u8::MAX  => LevelFilter::Trace,
    }
}

/// Raise or lower the active log level after initialization.
pub fn set_level(verbosity: u8) {
    log::set_max_level(u8_to_loglevel(verbosity));
}
