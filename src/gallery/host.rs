use std::collections::VecDeque;
use std::time::Duration;

use crate::events::{GalleryEvent, SlideId};
use crate::gallery::layout::{Placement, Size};
use crate::gallery::slide::TransitionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Repeats every interval until cancelled.
    Slideshow,
    /// Fires once.
    PerformanceIdle,
}

/// The environment a gallery session drives: image fetching, visual state,
/// animation and timers. Calls never block; completions come back through
/// the session's `image_loaded`, `image_failed`, `transition_complete`,
/// `slideshow_tick` and `performance_idle` entry points.
pub trait Host {
    fn container_size(&self) -> Size;

    /// Start fetching the image for `slide` from `url`.
    fn fetch(&mut self, slide: SlideId, url: &str);

    /// Release every resource held for `slide`.
    fn discard(&mut self, slide: SlideId);

    /// Disable dragging/selection of the loaded image.
    fn protect(&mut self, _slide: SlideId) {}

    fn set_visible(&mut self, slide: SlideId, visible: bool);

    /// Horizontal offset of the slide relative to its resting position.
    fn place(&mut self, slide: SlideId, left: f64);

    /// Tween the horizontal offset; `transition_complete(slide)` must follow.
    fn animate(&mut self, slide: SlideId, handle: TransitionHandle, from: f64, to: f64);

    fn apply_layout(&mut self, slide: SlideId, placement: Placement);

    /// Show the gallery, fading in over `fade` when given.
    fn reveal(&mut self, fade: Option<Duration>);

    fn set_lightweight(&mut self, enabled: bool);

    fn arm(&mut self, timer: Timer, after: Duration);

    fn cancel(&mut self, timer: Timer);

    fn notify(&mut self, event: GalleryEvent);
}

/// A request recorded by [`EffectQueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch {
        slide: SlideId,
        url: String,
    },
    Discard(SlideId),
    Protect(SlideId),
    Visibility {
        slide: SlideId,
        visible: bool,
    },
    Place {
        slide: SlideId,
        left: f64,
    },
    Animate {
        slide: SlideId,
        handle: TransitionHandle,
        from: f64,
        to: f64,
    },
    Layout {
        slide: SlideId,
        placement: Placement,
    },
    Reveal {
        fade: Option<Duration>,
    },
    Lightweight(bool),
    Arm {
        timer: Timer,
        after: Duration,
    },
    Cancel(Timer),
    Notify(GalleryEvent),
}

/// Host that records every request so an async driver (or a test) can act on
/// them after the session call returns.
#[derive(Debug)]
pub struct EffectQueue {
    container: Size,
    effects: VecDeque<Effect>,
}

impl EffectQueue {
    pub fn new(container: Size) -> Self {
        Self {
            container,
            effects: VecDeque::new(),
        }
    }

    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    pub fn pop(&mut self) -> Option<Effect> {
        self.effects.pop_front()
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl Host for EffectQueue {
    fn container_size(&self) -> Size {
        self.container
    }

    fn fetch(&mut self, slide: SlideId, url: &str) {
        self.effects.push_back(Effect::Fetch {
            slide,
            url: url.to_owned(),
        });
    }

    fn discard(&mut self, slide: SlideId) {
        self.effects.push_back(Effect::Discard(slide));
    }

    fn protect(&mut self, slide: SlideId) {
        self.effects.push_back(Effect::Protect(slide));
    }

    fn set_visible(&mut self, slide: SlideId, visible: bool) {
        self.effects
            .push_back(Effect::Visibility { slide, visible });
    }

    fn place(&mut self, slide: SlideId, left: f64) {
        self.effects.push_back(Effect::Place { slide, left });
    }

    fn animate(&mut self, slide: SlideId, handle: TransitionHandle, from: f64, to: f64) {
        self.effects.push_back(Effect::Animate {
            slide,
            handle,
            from,
            to,
        });
    }

    fn apply_layout(&mut self, slide: SlideId, placement: Placement) {
        self.effects.push_back(Effect::Layout { slide, placement });
    }

    fn reveal(&mut self, fade: Option<Duration>) {
        self.effects.push_back(Effect::Reveal { fade });
    }

    fn set_lightweight(&mut self, enabled: bool) {
        self.effects.push_back(Effect::Lightweight(enabled));
    }

    fn arm(&mut self, timer: Timer, after: Duration) {
        self.effects.push_back(Effect::Arm { timer, after });
    }

    fn cancel(&mut self, timer: Timer) {
        self.effects.push_back(Effect::Cancel(timer));
    }

    fn notify(&mut self, event: GalleryEvent) {
        self.effects.push_back(Effect::Notify(event));
    }
}
