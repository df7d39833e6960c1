// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::settings::LoggerSettings;
use std::io::Write;

/// Build the logger of the runtime named `name`.
///
/// Lines are written to the file at `settings.path`, if any, otherwise to
/// stderr. `filters`, in the `RUST_LOG` syntax, take precedence over the
/// configured level.
pub fn logger_builder(name: &str, settings: &LoggerSettings, filters: Option<&str>) -> anyhow::Result<env_logger::Builder> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(settings.level);
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }

    if let Some(path) = &settings.path {
        let path = std::path::Path::new(path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => file,
            Err(err) => anyhow::bail!("failed to open log file {}: {}", path.display(), err),
        };
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    let name = name.to_string();
    builder.format(move |buf, record| writeln!(buf, "{} - {} - {} - {}", buf.timestamp(), name, record.level(), record.args()));
    Ok(builder)
}

/// Install the process-wide logger.
pub fn init_logger(name: &str, settings: &LoggerSettings) -> anyhow::Result<()> {
    let filters = std::env::var("RUST_LOG").ok();
    logger_builder(name, settings, filters.as_deref())?.try_init()?;
    Ok(())
}
