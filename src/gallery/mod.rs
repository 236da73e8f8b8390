//! Slide lifecycle and transition state machine.
//!
//! A [`GallerySession`] owns the ordered slide list and decides what to fetch,
//! what to show and when to animate. Everything it wants done is requested from
//! its [`Host`]; everything the host finishes is reported back through the
//! session's public entry points. All calls run on one logical thread, so the
//! only mutual exclusion is the transition lock: while a slide animates, a new
//! navigation request overwrites `pending_transition` and a new picture set
//! waits in `pending_pictures`; both are re-evaluated on completion.

pub mod host;
pub mod layout;
pub mod slide;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::{GalleryOptions, PerformanceMode};
use crate::error::LoadFailure;
use crate::events::{Direction, GalleryEvent, ImageSize, SlideId};

pub use host::{Effect, EffectQueue, Host, Timer};
pub use slide::{Slide, SlideStatus, TransitionHandle};

/// The next requested transition, waiting for a load or for the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub target: SlideId,
    pub direction: Direction,
    pub skip_animation: bool,
}

pub struct GallerySession<H: Host> {
    host: H,
    options: GalleryOptions,
    slides: Vec<Slide>,
    foreign: Vec<Slide>,
    next_id: u64,
    current_index: Option<usize>,
    active: Option<SlideId>,
    previous: Option<SlideId>,
    pending_transition: Option<PendingTransition>,
    pending_pictures: Option<Vec<Arc<str>>>,
    in_transition: bool,
    outstanding_loads: usize,
    ready: bool,
    slider_ready: bool,
    omit_next_next: bool,
    slideshow_running: bool,
    lightweight: bool,
}

impl<H: Host> GallerySession<H> {
    pub fn new(host: H, options: GalleryOptions) -> Self {
        Self {
            host,
            options,
            slides: Vec::new(),
            foreign: Vec::new(),
            next_id: 0,
            current_index: None,
            active: None,
            previous: None,
            pending_transition: None,
            pending_pictures: None,
            in_transition: false,
            outstanding_loads: 0,
            ready: false,
            slider_ready: false,
            omit_next_next: false,
            slideshow_running: false,
            lightweight: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn options(&self) -> &GalleryOptions {
        &self.options
    }

    /// Number of slides in the current picture set.
    pub fn length(&self) -> usize {
        self.slides.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Live slides in display order.
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Slides retired by a picture-set change, kept until a transition ends.
    pub fn foreign_slides(&self) -> &[Slide] {
        &self.foreign
    }

    pub fn slide(&self, id: SlideId) -> Option<&Slide> {
        self.slides
            .iter()
            .chain(self.foreign.iter())
            .find(|slide| slide.id == id)
    }

    pub fn slide_by_url(&self, url: &str) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.url() == url)
    }

    pub fn active_slide(&self) -> Option<&Slide> {
        self.active.and_then(|id| self.slide(id))
    }

    pub fn previous_slide(&self) -> Option<&Slide> {
        self.previous.and_then(|id| self.slide(id))
    }

    pub fn pending_transition(&self) -> Option<PendingTransition> {
        self.pending_transition
    }

    pub fn has_deferred_pictures(&self) -> bool {
        self.pending_pictures.is_some()
    }

    pub fn is_in_transition(&self) -> bool {
        self.in_transition
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_slider_ready(&self) -> bool {
        self.slider_ready
    }

    pub fn outstanding_loads(&self) -> usize {
        self.outstanding_loads
    }

    pub fn is_slideshow_running(&self) -> bool {
        self.slideshow_running
    }

    pub fn is_lightweight(&self) -> bool {
        self.lightweight
    }

    /// Replaces the picture set. Slides whose URL survives are kept and
    /// reordered, the visible slide is retired until the next transition ends,
    /// everything else is destroyed. Empty input is ignored; duplicate URLs
    /// keep their first position.
    pub fn set_pictures<S: AsRef<str>>(&mut self, urls: &[S]) {
        let mut seen: HashSet<&str> = HashSet::new();
        let urls: Vec<Arc<str>> = urls
            .iter()
            .map(|url| url.as_ref())
            .filter(|url| seen.insert(*url))
            .map(Arc::from)
            .collect();

        if urls.is_empty() {
            debug!("ignoring empty picture set");
            return;
        }
        if self.in_transition {
            debug!(
                count = urls.len(),
                "transition running; deferring picture set"
            );
            self.pending_pictures = Some(urls);
            return;
        }
        self.apply_pictures(urls);
    }

    fn apply_pictures(&mut self, urls: Vec<Arc<str>>) {
        self.stop_slideshow();
        self.pending_transition = None;
        self.slider_ready = false;

        let wanted: HashSet<&str> = urls.iter().map(|url| &**url).collect();
        let mut reusable: HashMap<Arc<str>, Slide> = HashMap::new();
        let mut destroyed = 0usize;
        for mut slide in std::mem::take(&mut self.slides) {
            if wanted.contains(slide.url()) {
                reusable.insert(slide.url.clone(), slide);
            } else if slide.status == SlideStatus::Active {
                debug!(slide = %slide.id, url = %slide.url, "retiring visible slide");
                slide.foreign = true;
                self.foreign.push(slide);
            } else {
                destroyed += 1;
                self.destroy(slide);
            }
        }

        let (mut reused, mut created) = (0usize, 0usize);
        let mut first_pending = None;
        self.omit_next_next = false;
        for (position, url) in urls.into_iter().enumerate() {
            let mut slide = match reusable.remove(&url) {
                Some(slide) => {
                    reused += 1;
                    slide
                }
                None => {
                    created += 1;
                    let id = self.allocate_id();
                    Slide::new(id, url, position)
                }
            };
            slide.position = position;
            if position == 0 && self.active == Some(slide.id) {
                self.omit_next_next = true;
            }
            if first_pending.is_none() && slide.status == SlideStatus::Pending {
                first_pending = Some(slide.id);
            }
            self.slides.push(slide);
        }

        self.current_index = None;
        info!(
            length = self.slides.len(),
            reused,
            created,
            destroyed,
            retired = self.foreign.len(),
            "picture set applied"
        );

        match first_pending {
            Some(id) => self.load(id, true),
            None => self.launch(None),
        }
    }

    /// Requests a transition to the slide at `index`. Returns `false` without
    /// touching any state when the set is not navigable yet or the index is
    /// out of range.
    pub fn slide_to(&mut self, index: usize, direction: Direction, skip_animation: bool) -> bool {
        if !self.slider_ready || index >= self.slides.len() {
            debug!(
                index,
                length = self.slides.len(),
                slider_ready = self.slider_ready,
                "rejecting navigation"
            );
            return false;
        }

        // The reused visible slide already sits at position 0.
        if direction == Direction::Next && self.omit_next_next {
            self.omit_next_next = false;
            self.current_index = Some(index);
            return true;
        }

        self.pending_transition = Some(PendingTransition {
            target: self.slides[index].id,
            direction,
            skip_animation,
        });
        self.dispatch_pending();
        true
    }

    pub fn next(&mut self, skip_animation: bool, from_slideshow: bool) -> bool {
        if !self.slider_ready {
            return false;
        }
        if self.slideshow_running && !from_slideshow {
            self.stop_slideshow();
        }
        let index = match self.current_index {
            Some(current) if current + 1 < self.slides.len() => current + 1,
            _ => 0,
        };
        self.slide_to(index, Direction::Next, skip_animation)
    }

    pub fn prev(&mut self, skip_animation: bool) -> bool {
        if !self.slider_ready {
            return false;
        }
        self.stop_slideshow();
        let length = self.slides.len();
        let index = match self.current_index {
            Some(current) if current > 0 && current <= length => current - 1,
            _ => length.saturating_sub(1),
        };
        self.slide_to(index, Direction::Prev, skip_animation)
    }

    pub fn start_slideshow(&mut self) {
        if self.slideshow_running {
            return;
        }
        debug!(interval = ?self.options.slideshow_interval, "starting slideshow");
        self.host
            .arm(Timer::Slideshow, self.options.slideshow_interval);
        self.slideshow_running = true;
    }

    pub fn stop_slideshow(&mut self) {
        if self.slideshow_running {
            debug!("stopping slideshow");
        }
        self.host.cancel(Timer::Slideshow);
        self.slideshow_running = false;
    }

    /// Host callback for every [`Timer::Slideshow`] period.
    pub fn slideshow_tick(&mut self) {
        if !self.slideshow_running {
            trace!("ignoring slideshow tick after stop");
            return;
        }
        self.next(false, true);
    }

    /// Host callback: the image for `id` finished loading.
    pub fn image_loaded(&mut self, id: SlideId, size: ImageSize) {
        match self.slides.iter_mut().find(|slide| slide.id == id) {
            Some(slide) => {
                slide.remember_size(size);
                if slide.status == SlideStatus::Loading {
                    slide.status = SlideStatus::Ready;
                }
                let position = slide.position;
                debug!(
                    slide = %id,
                    position,
                    width = size.width,
                    height = size.height,
                    "image loaded"
                );
                if self.options.protect {
                    self.host.protect(id);
                }

                if !self.ready || !self.slider_ready {
                    let first = (!self.ready && position == 0).then_some(id);
                    self.launch(first);
                } else if self
                    .pending_transition
                    .is_some_and(|pending| pending.target == id)
                {
                    self.transition_to(id, true);
                }
            }
            None => {
                debug!(slide = %id, "image arrived for a destroyed slide");
                self.host.discard(id);
            }
        }
        self.release_load_slot();
    }

    /// Host callback: the image for `id` was aborted or could not be loaded.
    /// The slide is dropped and a pending transition towards it is retargeted.
    pub fn image_failed(&mut self, id: SlideId, failure: &LoadFailure) {
        match self.slides.iter().position(|slide| slide.id == id) {
            Some(index) => {
                let slide = self.slides.remove(index);
                let failed_position = slide.position;
                let announced = slide.announced;
                warn!(
                    slide = %id,
                    url = %slide.url,
                    abort = failure.is_abort(),
                    error = %failure,
                    "dropping slide that failed to load"
                );
                self.destroy(slide);
                self.renumber();

                if let Some(current) = self.current_index {
                    if current > failed_position {
                        self.current_index = Some(current - 1);
                    }
                }

                if let Some(pending) = self.pending_transition.filter(|p| p.target == id) {
                    self.retarget(pending, failed_position, announced);
                }
            }
            None => debug!(slide = %id, "load failure for a destroyed slide"),
        }
        self.release_load_slot();
    }

    /// Host callback: the animation started for `id` has finished.
    pub fn transition_complete(&mut self, id: SlideId) {
        if !self.in_transition || self.active != Some(id) {
            debug!(slide = %id, "ignoring stale transition completion");
            return;
        }

        if let Some(previous) = self.previous {
            self.host.set_visible(previous, false);
        }
        self.performance(false);
        self.in_transition = false;

        for slide in std::mem::take(&mut self.foreign) {
            self.destroy(slide);
        }

        if let Some(slide) = self.slide(id) {
            let event = GalleryEvent::AfterSlide {
                slide: slide.to_ref(),
                index: slide.position,
                length: self.slides.len(),
            };
            self.emit(event);
        }

        // Lock released: deferred work goes next.
        if let Some(urls) = self.pending_pictures.take() {
            self.apply_pictures(urls);
        } else {
            self.dispatch_pending();
        }
    }

    /// Host callback: the container changed size or orientation.
    pub fn resize(&mut self) {
        self.performance(true);
        self.layout_visible();
        self.performance(false);
    }

    /// Host callback for [`Timer::PerformanceIdle`].
    pub fn performance_idle(&mut self) {
        self.set_lightweight(false);
    }

    fn allocate_id(&mut self) -> SlideId {
        self.next_id += 1;
        SlideId(self.next_id)
    }

    fn emit(&mut self, event: GalleryEvent) {
        trace!(event = event.name(), "notify");
        self.host.notify(event);
    }

    fn destroy(&mut self, slide: Slide) {
        trace!(slide = %slide.id, url = %slide.url, "destroying slide");
        if self.previous == Some(slide.id) {
            self.previous = None;
        }
        if self.active == Some(slide.id) {
            self.active = None;
        }
        self.host.discard(slide.id);
    }

    fn renumber(&mut self) {
        for (position, slide) in self.slides.iter_mut().enumerate() {
            slide.position = position;
        }
    }

    fn load(&mut self, id: SlideId, immediate: bool) {
        if !immediate && self.outstanding_loads > 0 {
            return;
        }
        let Some(slide) = self.slides.iter_mut().find(|slide| slide.id == id) else {
            return;
        };
        let fetch_url = match slide.status {
            SlideStatus::Pending => {
                slide.status = SlideStatus::Loading;
                Some(format!("{}{}", self.options.base_path, slide.url))
            }
            SlideStatus::Loading => None,
            _ => return,
        };

        if immediate {
            self.announce(id);
        }

        if let Some(url) = fetch_url {
            self.outstanding_loads += 1;
            debug!(
                slide = %id,
                %url,
                immediate,
                outstanding = self.outstanding_loads,
                "fetching image"
            );
            self.host.fetch(id, &url);
        }
    }

    fn release_load_slot(&mut self) {
        self.outstanding_loads = self.outstanding_loads.saturating_sub(1);
        if self.outstanding_loads > 0 {
            return;
        }
        let queued = self
            .slides
            .iter()
            .find(|slide| slide.status == SlideStatus::Pending)
            .map(Slide::id);
        match queued {
            Some(id) => self.load(id, false),
            None => {
                // Nothing left to fetch: a set whose first slide failed must
                // still become navigable.
                if !self.slider_ready && !self.slides.is_empty() {
                    self.launch(None);
                }
                self.emit(GalleryEvent::LoadComplete);
            }
        }
    }

    fn announce(&mut self, id: SlideId) {
        let Some(slide) = self.slides.iter_mut().find(|slide| slide.id == id) else {
            return;
        };
        if slide.announced {
            return;
        }
        slide.announced = true;
        let event = GalleryEvent::BeforeSlideLoad {
            slide: slide.to_ref(),
            index: slide.position,
        };
        self.emit(event);
    }

    fn launch(&mut self, first: Option<SlideId>) {
        if self.ready && self.slider_ready {
            return;
        }

        if !self.ready {
            let first = first.or_else(|| {
                self.slides
                    .first()
                    .filter(|slide| slide.status.is_loaded())
                    .map(Slide::id)
            });
            let Some(id) = first else {
                trace!("first slide not loaded yet; launch postponed");
                return;
            };
            let Some(slide) = self.slides.iter_mut().find(|slide| slide.id == id) else {
                return;
            };
            slide.status = SlideStatus::Active;
            self.ready = true;
            self.active = Some(id);
            self.host.set_visible(id, true);
            self.layout_visible();
            self.current_index = Some(0);
            info!(slide = %id, "gallery ready");
            self.emit(GalleryEvent::Ready);

            let fade = Some(self.options.ready_fade_duration)
                .filter(|fade| self.options.fade_on_ready && !fade.is_zero());
            self.host.reveal(fade);
        }

        self.slider_ready = true;
        info!(length = self.slides.len(), "picture set ready");
        self.emit(GalleryEvent::PictureSetReady);
    }

    fn dispatch_pending(&mut self) {
        let Some(pending) = self.pending_transition else {
            return;
        };
        match self.slide(pending.target).map(Slide::status) {
            Some(SlideStatus::Pending) => self.load(pending.target, true),
            Some(SlideStatus::Loading) => {
                trace!(slide = %pending.target, "transition target still loading");
            }
            Some(_) if self.active == Some(pending.target) && !self.in_transition => {
                trace!(slide = %pending.target, "target already on screen");
                self.pending_transition = None;
            }
            Some(_) => self.transition_to(pending.target, false),
            None => self.pending_transition = None,
        }
    }

    fn fallback_target(&self, direction: Direction, failed_position: usize) -> Option<SlideId> {
        let length = self.slides.len();
        if length == 0 {
            return None;
        }
        let active = self
            .active
            .and_then(|id| self.slides.iter().position(|slide| slide.id == id));
        let position = match direction {
            Direction::Next if failed_position >= length => 0,
            Direction::Next => active.map_or(0, |p| (p + 1) % length),
            Direction::Prev if failed_position == 0 => length - 1,
            Direction::Prev => active.map_or(length - 1, |p| (p + length - 1) % length),
        };
        self.slides.get(position).map(Slide::id)
    }

    fn retarget(&mut self, pending: PendingTransition, failed_position: usize, announced: bool) {
        match self.fallback_target(pending.direction, failed_position) {
            Some(target) if Some(target) != self.active => {
                debug!(
                    failed_position,
                    fallback = %target,
                    direction = ?pending.direction,
                    "retargeting pending transition"
                );
                if announced {
                    self.announce(target);
                }
                self.pending_transition = Some(PendingTransition { target, ..pending });
                self.dispatch_pending();
            }
            _ => {
                debug!(failed_position, "no fallback target; dropping pending transition");
                self.pending_transition = None;
            }
        }
    }

    /// Starts the transition towards `id`. Dropped silently unless `id` is the
    /// recorded pending target, is loaded, is not already active, the current
    /// active slide still exists and no other transition holds the lock.
    fn transition_to(&mut self, id: SlideId, after_load: bool) {
        let Some(pending) = self.pending_transition else {
            return;
        };
        let Some(active) = self.active else {
            return;
        };
        if pending.target != id || active == id || self.slide(active).is_none() {
            return;
        }
        let loaded = self
            .slides
            .iter()
            .find(|slide| slide.id == id)
            .is_some_and(|slide| slide.status.is_loaded());
        if !loaded {
            return;
        }
        if self.in_transition {
            trace!(slide = %id, "transition running; request stays pending");
            return;
        }

        let remain_offset =
            self.host.container_size().width * self.options.remain_offset_percent / 100.0;
        let start = match pending.direction {
            Direction::Prev => -remain_offset,
            Direction::Next => remain_offset,
        };
        self.pending_transition = None;

        if let Some(previous) = self.previous.take() {
            if let Some(slide) = self.slide_mut(previous) {
                if slide.status == SlideStatus::Previous {
                    slide.status = SlideStatus::Ready;
                }
            }
        }
        if let Some(slide) = self.slide_mut(active) {
            slide.status = SlideStatus::Previous;
        }
        self.previous = Some(active);

        let duration = self.options.transition_duration;
        let Some(slide) = self.slides.iter_mut().find(|slide| slide.id == id) else {
            return;
        };
        slide.status = SlideStatus::Active;
        let index = slide.position;
        let announced = slide.announced;
        let slide_ref = slide.to_ref();
        let handle = slide.transition_handle(duration);

        self.active = Some(id);
        self.current_index = Some(index);
        self.in_transition = true;
        let length = self.slides.len();
        debug!(
            from = %active,
            to = %id,
            index,
            direction = ?pending.direction,
            skip_animation = pending.skip_animation,
            "starting transition"
        );

        if after_load && announced {
            self.emit(GalleryEvent::AfterSlideLoad {
                slide: slide_ref.clone(),
                index,
            });
        }

        self.performance(true);
        self.host.set_visible(id, false);
        self.host.place(id, start);
        self.layout_slide(id);
        self.emit(GalleryEvent::BeforeSlide {
            slide: slide_ref,
            index,
            length,
        });

        if pending.skip_animation {
            self.host.place(id, 0.0);
            self.host.set_visible(id, true);
            self.transition_complete(id);
        } else {
            self.host.set_visible(id, true);
            self.host.animate(id, handle, start, 0.0);
        }
    }

    fn slide_mut(&mut self, id: SlideId) -> Option<&mut Slide> {
        self.slides
            .iter_mut()
            .chain(self.foreign.iter_mut())
            .find(|slide| slide.id == id)
    }

    fn performance(&mut self, busy: bool) {
        if self.options.performance != PerformanceMode::Optimize {
            return;
        }
        self.host.cancel(Timer::PerformanceIdle);
        if busy {
            self.set_lightweight(true);
        } else {
            self.host
                .arm(Timer::PerformanceIdle, self.options.performance_delay);
        }
    }

    fn set_lightweight(&mut self, enabled: bool) {
        if self.lightweight != enabled {
            self.lightweight = enabled;
            self.host.set_lightweight(enabled);
        }
    }

    fn layout_visible(&mut self) {
        let previous = self.previous.filter(|_| self.in_transition);
        for id in self.active.into_iter().chain(previous) {
            self.layout_slide(id);
        }
    }

    fn layout_slide(&mut self, id: SlideId) {
        let Some(ratio) = self.slide(id).and_then(Slide::aspect_ratio) else {
            return;
        };
        let placement = layout::fit(
            self.host.container_size(),
            self.options.minimum_size(),
            ratio,
            self.options.centering(),
        );
        trace!(
            slide = %id,
            width = placement.width,
            height = placement.height,
            "layout"
        );
        self.host.apply_layout(id, placement);
    }
}
