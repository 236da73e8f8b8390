use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::LoadFailure;

/// Stable identity of a slide for the lifetime of the slide record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlideId(pub u64);

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide#{}", self.0)
    }
}

/// Which way a transition moves. `Prev` slides the incoming picture in from
/// the left, `Next` from the right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

/// Pixel dimensions of a fetched image, already corrected for EXIF rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Ordered list of picture URLs produced by the files task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureSet(pub Vec<String>);

/// Viewer -> Loader
#[derive(Debug, Clone)]
pub struct FetchImage {
    pub slide: SlideId,
    pub url: String,
}

/// Loader -> Viewer
#[derive(Debug)]
pub struct ImageFetched {
    pub slide: SlideId,
    pub outcome: Result<ImageSize, LoadFailure>,
}

/// Slide identity carried by notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRef {
    pub id: SlideId,
    pub url: Arc<str>,
}

/// Lifecycle notifications emitted by the gallery session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    /// The very first slide is on screen.
    Ready,
    /// The current picture set can be navigated.
    PictureSetReady,
    BeforeSlideLoad {
        slide: SlideRef,
        index: usize,
    },
    AfterSlideLoad {
        slide: SlideRef,
        index: usize,
    },
    BeforeSlide {
        slide: SlideRef,
        index: usize,
        length: usize,
    },
    AfterSlide {
        slide: SlideRef,
        index: usize,
        length: usize,
    },
    /// No slide is waiting to be fetched.
    LoadComplete,
}

impl GalleryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GalleryEvent::Ready => "ready",
            GalleryEvent::PictureSetReady => "picture-set-ready",
            GalleryEvent::BeforeSlideLoad { .. } => "before-slide-load",
            GalleryEvent::AfterSlideLoad { .. } => "after-slide-load",
            GalleryEvent::BeforeSlide { .. } => "before-slide",
            GalleryEvent::AfterSlide { .. } => "after-slide",
            GalleryEvent::LoadComplete => "load-complete",
        }
    }
}

/// Runtime control commands, accepted as JSON on the control socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum GalleryCommand {
    Next {
        #[serde(default, rename = "skip-animation")]
        skip_animation: bool,
    },
    Prev {
        #[serde(default, rename = "skip-animation")]
        skip_animation: bool,
    },
    SlideTo {
        index: usize,
        #[serde(default)]
        direction: Direction,
        #[serde(default, rename = "skip-animation")]
        skip_animation: bool,
    },
    StartSlideshow,
    StopSlideshow,
    Resize {
        width: u32,
        height: u32,
    },
    SetPictures {
        urls: Vec<String>,
    },
}
