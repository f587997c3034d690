use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "POST_REEL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub author: AuthorConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_carousel_interval", with = "humantime_serde")]
    pub carousel_interval: Duration,
    #[serde(default = "default_controls_quiet_period", with = "humantime_serde")]
    pub controls_quiet_period: Duration,
    #[serde(default = "default_scroll_debounce", with = "humantime_serde")]
    pub scroll_debounce: Duration,
    #[serde(default = "default_swipe_threshold_px")]
    pub swipe_threshold_px: f64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            carousel_interval: default_carousel_interval(),
            controls_quiet_period: default_controls_quiet_period(),
            scroll_debounce: default_scroll_debounce(),
            swipe_threshold_px: default_swipe_threshold_px(),
            page_size: default_page_size(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

fn default_carousel_interval() -> Duration {
    Duration::from_secs(8)
}

fn default_controls_quiet_period() -> Duration {
    Duration::from_secs(2)
}

fn default_scroll_debounce() -> Duration {
    Duration::from_millis(100)
}

fn default_swipe_threshold_px() -> f64 {
    50.0
}

fn default_page_size() -> usize {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_local_asset_base")]
    pub local_asset_base: String,
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
    #[serde(default = "default_video_markers")]
    pub video_markers: Vec<String>,
    #[serde(default = "default_avatar_markers")]
    pub avatar_markers: Vec<String>,
    #[serde(default = "default_transient_schemes")]
    pub transient_schemes: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            local_asset_base: default_local_asset_base(),
            probe_workers: default_probe_workers(),
            probe_timeout: default_probe_timeout(),
            video_markers: default_video_markers(),
            avatar_markers: default_avatar_markers(),
            transient_schemes: default_transient_schemes(),
        }
    }
}

fn default_local_asset_base() -> String {
    "http://127.0.0.1:8000/media/".into()
}

fn default_probe_workers() -> usize {
    2
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn default_video_markers() -> Vec<String> {
    [".mp4", ".webm", ".mov", ".avi", ".m4v", "video"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_avatar_markers() -> Vec<String> {
    [
        "profile-photo",
        "profile-displayphoto",
        "entity-photo",
        "actor",
        "shrink_100_100",
        "shrink_48_48",
        "shrink_40_40",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_transient_schemes() -> Vec<String> {
    vec!["blob:".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorConfig {
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
    #[serde(default = "default_avatar_service")]
    pub avatar_service: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            placeholder_name: default_placeholder_name(),
            avatar_service: default_avatar_service(),
        }
    }
}

fn default_placeholder_name() -> String {
    "Unknown Author".into()
}

fn default_avatar_service() -> String {
    "https://ui-avatars.com/api/".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    #[serde(default = "default_backend_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout: default_backend_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000/".into()
}

fn default_backend_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub directory: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
        }
    }
}

fn default_export_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| env::current_dir().ok())
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }
    if !other.ui.carousel_interval.is_zero() {
        base.ui.carousel_interval = other.ui.carousel_interval;
    }
    base.ui.controls_quiet_period = other.ui.controls_quiet_period;
    base.ui.scroll_debounce = other.ui.scroll_debounce;
    if other.ui.swipe_threshold_px > 0.0 {
        base.ui.swipe_threshold_px = other.ui.swipe_threshold_px;
    }
    if other.ui.page_size != 0 {
        base.ui.page_size = other.ui.page_size;
    }

    if !other.media.local_asset_base.is_empty() {
        base.media.local_asset_base = other.media.local_asset_base;
    }
    if other.media.probe_workers != 0 {
        base.media.probe_workers = other.media.probe_workers;
    }
    if !other.media.probe_timeout.is_zero() {
        base.media.probe_timeout = other.media.probe_timeout;
    }
    // Marker lists replace the defaults wholesale so a file can narrow them.
    base.media.video_markers = other.media.video_markers;
    base.media.avatar_markers = other.media.avatar_markers;
    base.media.transient_schemes = other.media.transient_schemes;

    if !other.author.placeholder_name.is_empty() {
        base.author.placeholder_name = other.author.placeholder_name;
    }
    if !other.author.avatar_service.is_empty() {
        base.author.avatar_service = other.author.avatar_service;
    }

    if !other.backend.base_url.is_empty() {
        base.backend.base_url = other.backend.base_url;
    }
    if !other.backend.timeout.is_zero() {
        base.backend.timeout = other.backend.timeout;
    }

    if other.export.directory.is_some() {
        base.export.directory = other.export.directory;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "ui.theme" => cfg.ui.theme = value,
        "ui.carousel_interval" => set_nonzero_duration(&mut cfg.ui.carousel_interval, &value),
        "ui.controls_quiet_period" => set_duration(&mut cfg.ui.controls_quiet_period, &value),
        "ui.scroll_debounce" => set_duration(&mut cfg.ui.scroll_debounce, &value),
        "ui.swipe_threshold_px" => {
            if let Ok(parsed) = value.parse::<f64>() {
                cfg.ui.swipe_threshold_px = parsed;
            }
        }
        "ui.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.ui.page_size = parsed.max(1);
            }
        }
        "media.local_asset_base" => cfg.media.local_asset_base = value,
        "media.probe_workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.media.probe_workers = parsed;
            }
        }
        "media.probe_timeout" => set_nonzero_duration(&mut cfg.media.probe_timeout, &value),
        "media.video_markers" => cfg.media.video_markers = split_list(&value),
        "media.avatar_markers" => cfg.media.avatar_markers = split_list(&value),
        "media.transient_schemes" => cfg.media.transient_schemes = split_list(&value),
        "author.placeholder_name" => cfg.author.placeholder_name = value,
        "author.avatar_service" => cfg.author.avatar_service = value,
        "backend.base_url" => cfg.backend.base_url = value,
        "backend.timeout" => set_nonzero_duration(&mut cfg.backend.timeout, &value),
        "export.directory" => cfg.export.directory = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn set_duration(slot: &mut Duration, value: &str) {
    if let Ok(duration) = humantime::parse_duration(value.trim()) {
        *slot = duration;
    }
}

/// Like `set_duration`, but a zero value leaves the slot unchanged.
fn set_nonzero_duration(slot: &mut Duration, value: &str) {
    if let Ok(duration) = humantime::parse_duration(value.trim()) {
        if !duration.is_zero() {
            *slot = duration;
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("post-reel").join("config.yaml"))
}
