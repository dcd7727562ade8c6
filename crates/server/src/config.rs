use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use config::{Config, Environment, File, FileFormat, Source};
use google_client::{
    drive::DRIVE_UPLOAD_URL,
    identity::{DEMO_TOKEN, GOOGLE_USERINFO_URL},
};
use serde::Deserialize;

const SETTINGS_FILE: &str = "server";
const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/onboarding.db";
const DEFAULT_FOLDER_ID: &str = "1Fyh4uQnWYDJCAgL3c_QAgMP89sOah0C3";
const DEFAULT_DEMO_LATENCY_MS: u64 = 1_000;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub drive_folder_id: String,
    pub drive_upload_url: String,
    pub userinfo_url: String,
    pub demo_token: String,
    pub demo_latency_ms: u64,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn demo_latency(&self) -> Duration {
        Duration::from_millis(self.demo_latency_ms)
    }
}

/// Built-in defaults, then `server.toml` if present, then `SERVER_BIND` /
/// `DATABASE_URL`, then `APP__*` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let vars: HashMap<String, String> = env::vars().collect();
    build_settings(
        File::with_name(SETTINGS_FILE)
            .format(FileFormat::Toml)
            .required(false),
        &vars,
    )
}

fn build_settings<S>(file: S, vars: &HashMap<String, String>) -> anyhow::Result<Settings>
where
    S: Source + Send + Sync + 'static,
{
    let shortcuts: HashMap<String, String> = [
        ("SERVER_BIND", "bind_addr"),
        ("DATABASE_URL", "database_url"),
    ]
    .into_iter()
    .filter_map(|(var, key)| vars.get(var).map(|value| (key.to_string(), value.clone())))
    .collect();

    let settings = Config::builder()
        .set_default("bind_addr", DEFAULT_BIND)?
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("drive_folder_id", DEFAULT_FOLDER_ID)?
        .set_default("drive_upload_url", DRIVE_UPLOAD_URL)?
        .set_default("userinfo_url", GOOGLE_USERINFO_URL)?
        .set_default("demo_token", DEMO_TOKEN)?
        .set_default("demo_latency_ms", DEFAULT_DEMO_LATENCY_MS)?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
        .add_source(file)
        .add_source(Environment::default().source(Some(shortcuts)))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        )
        .build()
        .context("failed to assemble server settings")?;

    settings
        .try_deserialize()
        .context("invalid server settings")
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
