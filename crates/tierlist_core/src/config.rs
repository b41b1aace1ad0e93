use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::drag::DEFAULT_ACTIVATION_DISTANCE;

pub const DEFAULT_SETTINGS_FILE: &str = "tierlist.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub share_base_url: String,
    pub api_token: Option<String>,
    pub drag_activation_distance: f32,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            share_base_url: "http://127.0.0.1:8080/".into(),
            api_token: None,
            drag_activation_distance: DEFAULT_ACTIVATION_DISTANCE,
            request_timeout_secs: 15,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `path` (or `tierlist.toml` in the working directory when it
/// exists), then environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_SETTINGS_FILE)).filter(|path| path.exists()),
    };
    if let Some(file) = file {
        let raw = fs::read_to_string(&file)
            .with_context(|| format!("failed to read settings file '{}'", file.display()))?;
        apply_file_settings(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", file.display()))?;
        debug!(path = %file.display(), "loaded settings file");
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Shape of `tierlist.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    share_base_url: Option<String>,
    api_token: Option<String>,
    drag_activation_distance: Option<f32>,
    request_timeout_secs: Option<u64>,
}

fn apply_file_settings(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file.share_base_url {
        settings.share_base_url = v;
    }
    if let Some(v) = file.api_token {
        settings.api_token = Some(v);
    }
    if let Some(v) = file.drag_activation_distance {
        settings.drag_activation_distance = v;
    }
    if let Some(v) = file.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TIERLIST_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("TIERLIST_SHARE_URL") {
        settings.share_base_url = v;
    }
    if let Some(v) = lookup("APP__SHARE_BASE_URL") {
        settings.share_base_url = v;
    }

    if let Some(v) = lookup("TIERLIST_API_TOKEN") {
        settings.api_token = Some(v);
    }
    if let Some(v) = lookup("APP__API_TOKEN") {
        settings.api_token = Some(v);
    }

    if let Some(v) = lookup("APP__DRAG_ACTIVATION_DISTANCE") {
        match v.parse::<f32>() {
            Ok(parsed) => settings.drag_activation_distance = parsed,
            Err(_) => warn!(value = %v, "ignoring unparsable APP__DRAG_ACTIVATION_DISTANCE"),
        }
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring unparsable APP__REQUEST_TIMEOUT_SECS"),
        }
    }
}
