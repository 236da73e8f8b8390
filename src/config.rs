use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::gallery::layout::{Centering, Size};

pub const DEFAULT_CONTROL_SOCKET_PATH: &str = "/run/slide-gallery/control.sock";

/// Whether the gallery switches to a lightweight rendering state while slides
/// move or the viewport is resized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceMode {
    #[default]
    Optimize,
    Off,
}

/// Behaviour of the gallery session itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GalleryOptions {
    /// Minimum displayed image width in pixels, even when the viewport is narrower.
    pub min_width: u32,
    /// Minimum displayed image height in pixels, even when the viewport is shorter.
    pub min_height: u32,
    pub horizontal_center: bool,
    pub vertical_center: bool,
    /// Fade the gallery in once the first picture is shown.
    pub fade_on_ready: bool,
    #[serde(with = "humantime_serde")]
    pub ready_fade_duration: Duration,
    /// Disable dragging/selection of loaded images.
    pub protect: bool,
    pub performance: PerformanceMode,
    /// Idle time before the lightweight rendering state is dropped again.
    #[serde(with = "humantime_serde")]
    pub performance_delay: Duration,
    /// Prefix prepended to every picture URL before it is fetched.
    pub base_path: String,
    #[serde(with = "humantime_serde")]
    pub transition_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub slideshow_interval: Duration,
    /// How far off-screen an incoming slide starts, in percent of the viewport width.
    pub remain_offset_percent: f64,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            min_width: 0,
            min_height: 0,
            horizontal_center: true,
            vertical_center: true,
            fade_on_ready: true,
            ready_fade_duration: Duration::from_millis(500),
            protect: true,
            performance: PerformanceMode::Optimize,
            performance_delay: Duration::from_millis(50),
            base_path: String::new(),
            transition_duration: Duration::from_millis(250),
            slideshow_interval: Duration::from_millis(5000),
            remain_offset_percent: 8.0,
        }
    }
}

impl GalleryOptions {
    pub fn minimum_size(&self) -> Size {
        Size::new(f64::from(self.min_width), f64::from(self.min_height))
    }

    pub fn centering(&self) -> Centering {
        Centering {
            horizontal: self.horizontal_center,
            vertical: self.vertical_center,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.remain_offset_percent.is_finite()
                && (0.0..=100.0).contains(&self.remain_offset_percent),
            "remain-offset-percent must be between 0 and 100"
        );
        ensure!(
            !self.slideshow_interval.is_zero(),
            "slideshow-interval must be greater than zero"
        );
        Ok(())
    }
}

/// Size of the area the gallery fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Viewport {
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory scanned recursively for pictures.
    pub picture_library_path: PathBuf,
    /// Unix domain socket accepting runtime control commands.
    #[serde(default = "Configuration::default_control_socket_path")]
    pub control_socket_path: PathBuf,
    /// Optional deterministic seed for shuffling the picture order. Pictures
    /// are sorted by path when absent.
    pub shuffle_seed: Option<u64>,
    pub viewport: Viewport,
    /// Start the slideshow whenever a picture set becomes ready.
    pub autostart_slideshow: bool,
    /// Quiet period after a library change before the library is rescanned.
    #[serde(with = "humantime_serde")]
    pub rescan_debounce: Duration,
    pub gallery: GalleryOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.picture_library_path.as_os_str().is_empty(),
            "picture-library-path must not be empty"
        );
        ensure!(
            self.control_socket_path.file_name().is_some(),
            "control-socket-path must include a socket file name"
        );
        ensure!(
            self.viewport.width > 0 && self.viewport.height > 0,
            "viewport dimensions must be greater than zero"
        );
        self.gallery
            .validate()
            .context("invalid gallery configuration")?;
        Ok(self)
    }

    fn default_control_socket_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            picture_library_path: PathBuf::new(),
            control_socket_path: Self::default_control_socket_path(),
            shuffle_seed: None,
            viewport: Viewport::default(),
            autostart_slideshow: true,
            rescan_debounce: Duration::from_millis(250),
            gallery: GalleryOptions::default(),
        }
    }
}
