//! Headless gallery host: runs a [`GallerySession`] against tokio timers and
//! the loader task, keeping a simple stage model of what would be on screen.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::config::Configuration;
use crate::events::{FetchImage, GalleryCommand, GalleryEvent, ImageFetched, PictureSet, SlideId};
use crate::gallery::layout::{Placement, Size};
use crate::gallery::{Effect, EffectQueue, GallerySession, Timer, TransitionHandle};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// What the host currently shows for one slide.
#[derive(Debug, Clone, Copy, Default)]
struct SlideVisual {
    visible: bool,
    left: f64,
    placement: Option<Placement>,
    protected: bool,
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    slide: SlideId,
    handle: TransitionHandle,
    from: f64,
    to: f64,
    started: Instant,
}

struct Driver {
    session: GallerySession<EffectQueue>,
    stage: HashMap<SlideId, SlideVisual>,
    revealed: bool,
    animations: Vec<Animation>,
    slideshow: Option<Interval>,
    idle_at: Option<Instant>,
    autostart: bool,
    to_loader: Sender<FetchImage>,
    events: Sender<GalleryEvent>,
}

#[instrument(skip_all, name = "viewer")]
pub async fn run(
    cfg: Configuration,
    mut pictures_rx: Receiver<PictureSet>,
    mut commands_rx: Receiver<GalleryCommand>,
    mut fetched_rx: Receiver<ImageFetched>,
    to_loader: Sender<FetchImage>,
    events: Sender<GalleryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let host = EffectQueue::new(cfg.viewport.size());
    let mut driver = Driver {
        session: GallerySession::new(host, cfg.gallery.clone()),
        stage: HashMap::new(),
        revealed: false,
        animations: Vec::new(),
        slideshow: None,
        idle_at: None,
        autostart: cfg.autostart_slideshow,
        to_loader,
        events,
    };
    let mut frames = interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting viewer task");
                break;
            }

            Some(PictureSet(urls)) = pictures_rx.recv() => {
                debug!(count = urls.len(), "picture set received");
                driver.session.set_pictures(&urls);
            }

            Some(command) = commands_rx.recv() => {
                driver.handle_command(command);
            }

            Some(ImageFetched { slide, outcome }) = fetched_rx.recv() => match outcome {
                Ok(size) => driver.session.image_loaded(slide, size),
                Err(err) => driver.session.image_failed(slide, &err),
            },

            _ = frames.tick(), if !driver.animations.is_empty() => {
                driver.advance_animations(Instant::now());
            }

            _ = next_tick(&mut driver.slideshow) => {
                driver.session.slideshow_tick();
            }

            _ = sleep_until(driver.idle_at.unwrap_or_else(Instant::now)), if driver.idle_at.is_some() => {
                driver.idle_at = None;
                driver.session.performance_idle();
            }
        }

        driver.apply_effects().await?;
    }
    Ok(())
}

async fn next_tick(slideshow: &mut Option<Interval>) {
    match slideshow {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Driver {
    fn handle_command(&mut self, command: GalleryCommand) {
        debug!(?command, "control command");
        let accepted = match command {
            GalleryCommand::Next { skip_animation } => self.session.next(skip_animation, false),
            GalleryCommand::Prev { skip_animation } => self.session.prev(skip_animation),
            GalleryCommand::SlideTo {
                index,
                direction,
                skip_animation,
            } => self.session.slide_to(index, direction, skip_animation),
            GalleryCommand::StartSlideshow => {
                self.session.start_slideshow();
                true
            }
            GalleryCommand::StopSlideshow => {
                self.session.stop_slideshow();
                true
            }
            GalleryCommand::Resize { width, height } => {
                self.session
                    .host_mut()
                    .set_container(Size::new(f64::from(width), f64::from(height)));
                self.session.resize();
                true
            }
            GalleryCommand::SetPictures { urls } => {
                self.session.set_pictures(&urls);
                true
            }
        };
        if !accepted {
            debug!("navigation ignored; picture set not ready or index out of range");
        }
    }

    fn advance_animations(&mut self, now: Instant) {
        let mut finished = Vec::new();
        for animation in &self.animations {
            let elapsed = now.duration_since(animation.started);
            let left = animation
                .handle
                .offset_at(animation.from, animation.to, elapsed);
            self.stage.entry(animation.slide).or_default().left = left;
            trace!(slide = %animation.slide, left, "frame");
            if animation.handle.is_finished(elapsed) {
                finished.push(animation.slide);
            }
        }
        self.animations
            .retain(|animation| !finished.contains(&animation.slide));
        for slide in finished {
            self.session.transition_complete(slide);
        }
    }

    /// Carries out everything the session asked for, including requests that
    /// are raised while earlier ones are handled.
    async fn apply_effects(&mut self) -> Result<()> {
        while let Some(effect) = self.session.host_mut().pop() {
            match effect {
                Effect::Fetch { slide, url } => {
                    self.to_loader
                        .send(FetchImage { slide, url })
                        .await
                        .context("loader task stopped")?;
                }
                Effect::Discard(slide) => {
                    self.stage.remove(&slide);
                    self.animations.retain(|animation| animation.slide != slide);
                }
                Effect::Protect(slide) => self.stage.entry(slide).or_default().protected = true,
                Effect::Visibility { slide, visible } => {
                    self.stage.entry(slide).or_default().visible = visible;
                }
                Effect::Place { slide, left } => {
                    self.animations.retain(|animation| animation.slide != slide);
                    self.stage.entry(slide).or_default().left = left;
                }
                Effect::Animate {
                    slide,
                    handle,
                    from,
                    to,
                } => {
                    self.stage.entry(slide).or_default().left = from;
                    self.animations.push(Animation {
                        slide,
                        handle,
                        from,
                        to,
                        started: Instant::now(),
                    });
                }
                Effect::Layout { slide, placement } => {
                    self.stage.entry(slide).or_default().placement = Some(placement);
                }
                Effect::Reveal { fade } => {
                    if !self.revealed {
                        info!(fade = ?fade, "gallery revealed");
                    }
                    self.revealed = true;
                }
                Effect::Lightweight(enabled) => trace!(enabled, "lightweight rendering"),
                Effect::Arm { timer, after } => self.arm(timer, after),
                Effect::Cancel(Timer::Slideshow) => self.slideshow = None,
                Effect::Cancel(Timer::PerformanceIdle) => self.idle_at = None,
                Effect::Notify(event) => self.publish(event).await,
            }
        }
        Ok(())
    }

    fn arm(&mut self, timer: Timer, after: Duration) {
        let deadline = Instant::now() + after;
        match timer {
            Timer::Slideshow => {
                let mut slideshow = interval_at(deadline, after);
                slideshow.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.slideshow = Some(slideshow);
            }
            Timer::PerformanceIdle => self.idle_at = Some(deadline),
        }
    }

    async fn publish(&mut self, event: GalleryEvent) {
        match &event {
            GalleryEvent::PictureSetReady if self.autostart => self.session.start_slideshow(),
            GalleryEvent::AfterSlide { slide, .. } => {
                if let Some(visual) = self.stage.get(&slide.id) {
                    debug!(
                        slide = %slide.id,
                        url = %slide.url,
                        visible = visual.visible,
                        left = visual.left,
                        protected = visual.protected,
                        placement = ?visual.placement,
                        on_stage = self.stage.len(),
                        "slide shown"
                    );
                }
            }
            _ => {}
        }
        // Nobody listening is fine.
        let _ = self.events.send(event).await;
    }
}
