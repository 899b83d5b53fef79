use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long the bin lid stays open after an accepted item.
pub const BIN_OPEN_DURATION: Duration = Duration::from_millis(5000);

/// Points credited for every accepted item.
pub const REWARD_POINTS: u32 = 10;

const CONFIG_FILE: &str = "smartbin_config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub services: ServiceConfig,
    pub display: DisplayConfig,
    pub camera: CameraConfig,
    pub gpio: GpioConfig,
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub classify_url: String,
    pub reward_url: String,
    pub login_url: String,
    pub users_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    pub enabled: bool,
    pub lid_pin: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub session_file: PathBuf,
    pub capture_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: ServiceConfig {
                classify_url: "https://geminiapp-dp6r.onrender.com/classify".to_string(),
                reward_url: "https://ledwaba-and-friends.onrender.com/api/givePoints".to_string(),
                login_url: "https://ledwaba-and-friends.onrender.com/api/login".to_string(),
                users_url: "https://ledwaba-and-friends.onrender.com/api/AppUsers".to_string(),
            },
            display: DisplayConfig {
                width: 800,
                height: 480,
                fullscreen: true,
            },
            camera: CameraConfig {
                enabled: true,
                width: 800,
                height: 600,
                quality: 85,
            },
            gpio: GpioConfig {
                enabled: true,
                lid_pin: 17,
            },
            paths: PathConfig {
                session_file: PathBuf::from("smartbin_session.json"),
                capture_dir: PathBuf::from("captures"),
                config_file: PathBuf::from(CONFIG_FILE),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(CONFIG_FILE);

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            log::info!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save()?;
            Ok(default_config)
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| "Failed to parse configuration file")?;
        config.validate()?;

        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_file(&self.paths.config_file)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow::anyhow!("Invalid display dimensions"));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow::anyhow!("Invalid camera resolution"));
        }

        if self.camera.quality > 100 {
            return Err(anyhow::anyhow!("Invalid camera quality: {}", self.camera.quality));
        }

        // BCM numbering on the 40-pin header
        if self.gpio.lid_pin > 27 {
            return Err(anyhow::anyhow!("Invalid GPIO pin for bin lid: {}", self.gpio.lid_pin));
        }

        let urls = [
            ("classify_url", &self.services.classify_url),
            ("reward_url", &self.services.reward_url),
            ("login_url", &self.services.login_url),
            ("users_url", &self.services.users_url),
        ];
        for (name, raw) in urls {
            let url = Url::parse(raw).with_context(|| format!("Invalid {name}: {raw}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow::anyhow!("Unsupported scheme for {}: {}", name, url.scheme()));
            }
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.capture_dir)
            .with_context(|| format!("Failed to create capture directory: {}",
                self.paths.capture_dir.display()))?;

        log::info!("Created necessary directories");
        Ok(())
    }

    /// Point every service at the same host, keeping the conventional routes.
    pub fn use_service_host(&mut self, base_url: &str) {
        let base = base_url.trim_end_matches('/');
        self.services.classify_url = format!("{base}/classify");
        self.services.reward_url = format!("{base}/api/givePoints");
        self.services.login_url = format!("{base}/api/login");
        self.services.users_url = format!("{base}/api/AppUsers");
        log::info!("Service host set to {}", base);
    }
}

// Configuration builder for easier setup
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn display_size(mut self, width: u32, height: u32) -> Self {
        self.config.display.width = width;
        self.config.display.height = height;
        self
    }

    pub fn fullscreen(mut self, enabled: bool) -> Self {
        self.config.display.fullscreen = enabled;
        self
    }

    pub fn gpio_enabled(mut self, enabled: bool) -> Self {
        self.config.gpio.enabled = enabled;
        self
    }

    pub fn lid_pin(mut self, pin: u8) -> Self {
        self.config.gpio.lid_pin = pin;
        self
    }

    pub fn camera_enabled(mut self, enabled: bool) -> Self {
        self.config.camera.enabled = enabled;
        self
    }

    pub fn service_host(mut self, base_url: &str) -> Self {
        self.config.use_service_host(base_url);
        self
    }

    pub fn session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.session_file = path.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Environment-specific configuration presets
impl Config {
    pub fn raspberry_pi_7inch() -> Self {
        Config {
            display: DisplayConfig {
                width: 800,
                height: 480,
                fullscreen: true,
            },
            ..Default::default()
        }
    }

    pub fn development_desktop() -> Self {
        Config {
            display: DisplayConfig {
                width: 1024,
                height: 768,
                fullscreen: false,
            },
            gpio: GpioConfig {
                enabled: false,
                ..Config::default().gpio
            },
            ..Default::default()
        }
    }
}
