/*
 * Logger setup for the binary. Everything goes to stderr through a `TermLogger`; when
 * a log file can be opened a `WriteLogger` receives the same records. A file that
 * cannot be created only costs the file sink, never the terminal one.
 */
use crate::core::path_utils;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const LOG_FILENAME: &str = "sketch_depot.log";

// Where the log file goes when the configuration does not name one.
pub fn default_log_file(app_name: &str) -> Option<PathBuf> {
    path_utils::get_base_app_data_local_dir(app_name).map(|dir| dir.join(LOG_FILENAME))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/*
 * Installs the global logger. Returns the path of the log file actually in use, if
 * any. Calling this a second time leaves the first logger in place.
 */
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Option<PathBuf> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let mut file_in_use = None;
    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                // The file always gets full detail.
                loggers.push(WriteLogger::new(LevelFilter::Debug.max(level), config, file));
                file_in_use = Some(path.to_path_buf());
            }
            Err(e) => eprintln!("Could not open log file {path:?}: {e}. Logging to stderr only."),
        }
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Logger already initialised: {e}");
        return None;
    }
    if let Some(path) = &file_in_use {
        log::debug!("Logging: Writing log file {path:?}.");
    }
    file_in_use
}
