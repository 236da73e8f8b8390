use std::sync::Arc;
use std::time::Duration;

use crate::events::{ImageSize, SlideId, SlideRef};
use crate::gallery::layout::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideStatus {
    /// Known but not fetched yet.
    Pending,
    /// Fetch in flight.
    Loading,
    /// Loaded and hidden.
    Ready,
    /// Fully visible (or animating in).
    Active,
    /// Being animated away from, hidden once the transition ends.
    Previous,
}

impl SlideStatus {
    pub fn is_loaded(self) -> bool {
        !matches!(self, SlideStatus::Pending | SlideStatus::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    QuartOut,
}

impl Easing {
    /// Maps linear progress in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::QuartOut => 1.0 - (1.0 - t).powi(4),
        }
    }
}

/// Tween parameters for sliding one slide into view. Created the first time
/// the slide is shown and reused for every later transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionHandle {
    pub duration: Duration,
    pub easing: Easing,
}

impl TransitionHandle {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            easing: Easing::QuartOut,
        }
    }

    /// Horizontal offset `elapsed` into a tween from `from` to `to`.
    pub fn offset_at(&self, from: f64, to: f64, elapsed: Duration) -> f64 {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / self.duration.as_secs_f64()
        };
        from + (to - from) * self.easing.apply(progress)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub(crate) id: SlideId,
    pub(crate) url: Arc<str>,
    pub(crate) position: usize,
    pub(crate) status: SlideStatus,
    pub(crate) foreign: bool,
    pub(crate) announced: bool,
    pub(crate) original_size: Option<Size>,
    pub(crate) aspect_ratio: Option<f64>,
    pub(crate) transition: Option<TransitionHandle>,
}

impl Slide {
    pub(crate) fn new(id: SlideId, url: Arc<str>, position: usize) -> Self {
        Self {
            id,
            url,
            position,
            status: SlideStatus::Pending,
            foreign: false,
            announced: false,
            original_size: None,
            aspect_ratio: None,
            transition: None,
        }
    }

    pub fn id(&self) -> SlideId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn status(&self) -> SlideStatus {
        self.status
    }

    /// Retired by a picture-set change; destroyed after the next transition.
    pub fn is_foreign(&self) -> bool {
        self.foreign
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub fn original_size(&self) -> Option<Size> {
        self.original_size
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.aspect_ratio
    }

    pub fn transition(&self) -> Option<TransitionHandle> {
        self.transition
    }

    pub(crate) fn to_ref(&self) -> SlideRef {
        SlideRef {
            id: self.id,
            url: self.url.clone(),
        }
    }

    /// Records the image dimensions; the first measurement wins.
    pub(crate) fn remember_size(&mut self, size: ImageSize) {
        let original = *self.original_size.get_or_insert(Size::new(
            f64::from(size.width),
            f64::from(size.height),
        ));
        if self.aspect_ratio.is_none() && original.width > 0.0 {
            self.aspect_ratio = Some(original.height / original.width);
        }
    }

    pub(crate) fn transition_handle(&mut self, duration: Duration) -> TransitionHandle {
        *self
            .transition
            .get_or_insert_with(|| TransitionHandle::new(duration))
    }
}
