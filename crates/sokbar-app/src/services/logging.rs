// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tracing setup: human-readable events on stderr, and optionally a plain-text
// session log file per run.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use sokbar_core::error::Result;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `<dir>/log_<YYYY-MM-DD_HH-MM-SS>.txt` for a session started at `started`.
pub fn session_log_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    dir.join(format!("log_{}.txt", started.format("%Y-%m-%d_%H-%M-%S")))
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
///
/// Returns the session log path when `log_dir` is given.
pub fn init(log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = session_log_path(dir, Local::now());
            let file = File::create(&path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_log_name_is_timestamped() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            session_log_path(Path::new("logs"), started),
            PathBuf::from("logs/log_2024-03-09_07-05-01.txt")
        );
    }
}
