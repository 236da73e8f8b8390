use slide_gallery::config::GalleryOptions;
use slide_gallery::error::LoadFailure;
use slide_gallery::events::{Direction, GalleryEvent, ImageSize, SlideId};
use slide_gallery::gallery::layout::Size;
use slide_gallery::gallery::{Effect, EffectQueue, GallerySession, SlideStatus, Timer};
use std::time::Duration;

const LANDSCAPE: ImageSize = ImageSize {
    width: 800,
    height: 600,
};

type Session = GallerySession<EffectQueue>;

fn gallery(urls: &[&str]) -> Session {
    let mut session = GallerySession::new(
        EffectQueue::new(Size::new(1000.0, 500.0)),
        GalleryOptions::default(),
    );
    session.set_pictures(urls);
    session
}

fn id(session: &Session, url: &str) -> SlideId {
    session
        .slide_by_url(url)
        .map(|slide| slide.id())
        .unwrap_or_else(|| panic!("no slide for {url}"))
}

fn load(session: &mut Session, url: &str) {
    let slide = id(session, url);
    session.image_loaded(slide, LANDSCAPE);
}

fn fail(session: &mut Session, url: &str) {
    let slide = id(session, url);
    session.image_failed(slide, &LoadFailure::Aborted);
}

fn finish(session: &mut Session) {
    let active = session.active_slide().map(|slide| slide.id()).unwrap();
    session.transition_complete(active);
}

fn events(session: &mut Session) -> Vec<GalleryEvent> {
    session
        .host_mut()
        .drain()
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Notify(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn names(events: &[GalleryEvent]) -> Vec<&'static str> {
    events.iter().map(GalleryEvent::name).collect()
}

fn positions(session: &Session) -> Vec<usize> {
    session.slides().iter().map(|slide| slide.position()).collect()
}

fn count(session: &Session, status: SlideStatus) -> usize {
    session
        .slides()
        .iter()
        .chain(session.foreign_slides())
        .filter(|slide| slide.status() == status)
        .count()
}

/// Every picture loaded, "a" on screen, no transition running.
fn settled(urls: &[&str]) -> Session {
    let mut session = gallery(urls);
    for url in urls {
        load(&mut session, url);
    }
    session.host_mut().drain();
    session
}

#[test]
fn first_load_launches_gallery() {
    let mut s = gallery(&["a", "b", "c"]);
    assert!(!s.is_ready());
    assert!(!s.next(false, false));

    let emitted = events(&mut s);
    assert_eq!(names(&emitted), vec!["before-slide-load"]);

    load(&mut s, "a");
    let effects = s.host_mut().drain();
    assert!(effects.contains(&Effect::Reveal {
        fade: Some(Duration::from_millis(500))
    }));
    let emitted: Vec<_> = effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Notify(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(names(&emitted), vec!["ready", "picture-set-ready"]);

    assert!(s.is_ready());
    assert!(s.is_slider_ready());
    assert_eq!(s.current_index(), Some(0));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("a"));
}

#[test]
fn next_waits_for_loading_target() {
    let mut s = gallery(&["a", "b", "c"]);
    load(&mut s, "a");
    s.host_mut().drain();
    // "b" is being fetched in the background
    assert_eq!(s.slide_by_url("b").unwrap().status(), SlideStatus::Loading);

    assert!(s.next(false, false));
    assert!(!s.is_in_transition());
    assert_eq!(s.pending_transition().map(|p| p.target), Some(id(&s, "b")));

    load(&mut s, "b");
    assert!(s.is_in_transition());
    assert_eq!(s.current_index(), Some(1));

    finish(&mut s);
    assert!(!s.is_in_transition());
    assert_eq!(s.current_index(), Some(1));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("b"));
    assert_eq!(s.previous_slide().map(|slide| slide.url()), Some("a"));

    let emitted = events(&mut s);
    assert!(emitted.iter().any(|event| matches!(
        event,
        GalleryEvent::AfterSlide { index: 1, length: 3, .. }
    )));
}

#[test]
fn immediate_target_announces_load() {
    let mut s = gallery(&["a", "b", "c"]);
    load(&mut s, "a");
    s.host_mut().drain();

    assert!(s.slide_to(2, Direction::Next, false));
    load(&mut s, "c");
    let emitted = events(&mut s);
    assert_eq!(
        names(&emitted),
        vec!["before-slide-load", "after-slide-load", "before-slide"]
    );
}

#[test]
fn next_then_prev_restores_index() {
    let mut s = settled(&["a", "b", "c"]);
    assert!(s.next(false, false));
    finish(&mut s);
    assert_eq!(s.current_index(), Some(1));

    assert!(s.prev(false));
    finish(&mut s);
    assert_eq!(s.current_index(), Some(0));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("a"));
}

#[test]
fn navigation_wraps_around() {
    let mut s = settled(&["a", "b", "c"]);
    assert!(s.prev(true));
    assert_eq!(s.current_index(), Some(2));
    assert!(s.next(true, false));
    assert_eq!(s.current_index(), Some(0));
}

#[test]
fn prev_enters_from_the_left() {
    let mut s = settled(&["a", "b"]);
    assert!(s.prev(false));
    let b = id(&s, "b");
    let effects = s.host_mut().drain();
    // 8% of a 1000px wide container
    assert!(effects.contains(&Effect::Place { slide: b, left: -80.0 }));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Animate { slide, from, to, .. } if *slide == b && *from == -80.0 && *to == 0.0
    )));
}

#[test]
fn out_of_range_leaves_state_untouched() {
    let mut s = settled(&["a", "b", "c"]);
    assert!(!s.slide_to(3, Direction::Next, false));
    assert!(!s.slide_to(usize::MAX, Direction::Prev, true));
    assert_eq!(s.current_index(), Some(0));
    assert_eq!(s.pending_transition(), None);
    assert!(!s.is_in_transition());
    assert!(s.host().is_empty());
}

#[test]
fn failure_renumbers_positions() {
    let mut s = gallery(&["a", "b", "c", "d"]);
    load(&mut s, "a");
    fail(&mut s, "b");
    assert_eq!(s.length(), 3);
    assert_eq!(positions(&s), vec![0, 1, 2]);
    assert!(s.slide_by_url("b").is_none());
    assert_eq!(s.slide_by_url("d").unwrap().position(), 2);
    assert_eq!(s.current_index(), Some(0));
}

#[test]
fn failure_before_current_shifts_index() {
    let mut s = gallery(&["a", "b", "c"]);
    load(&mut s, "a");
    // "b" is still fetching in the background while we jump past it.
    assert!(s.slide_to(2, Direction::Next, true));
    load(&mut s, "c");
    assert_eq!(s.current_index(), Some(2));

    fail(&mut s, "b");
    assert_eq!(s.current_index(), Some(1));
    assert_eq!(s.active_slide().map(|slide| slide.position()), Some(1));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("c"));
}

#[test]
fn at_most_one_active_and_previous() {
    let mut s = settled(&["a", "b", "c", "d"]);
    for _ in 0..6 {
        s.next(false, false);
        s.slide_to(3, Direction::Prev, false);
        assert!(count(&s, SlideStatus::Active) <= 1);
        assert!(count(&s, SlideStatus::Previous) <= 1);
        finish(&mut s);
        assert_eq!(count(&s, SlideStatus::Active), 1);
        assert!(count(&s, SlideStatus::Previous) <= 1);
    }
}

#[test]
fn transition_lock_defers_requests() {
    let mut s = settled(&["a", "b", "c"]);
    assert!(s.next(false, false));
    let b = id(&s, "b");

    assert!(s.slide_to(2, Direction::Next, false));
    assert_eq!(s.active_slide().map(|slide| slide.id()), Some(b));
    assert_eq!(s.current_index(), Some(1));

    finish(&mut s);
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("c"));
    assert_eq!(s.current_index(), Some(2));
}

#[test]
fn reconciliation_reuses_and_destroys() {
    let mut s = gallery(&["a", "b"]);
    load(&mut s, "a");
    let a = id(&s, "a");
    let b = id(&s, "b");
    s.host_mut().drain();

    s.set_pictures(&["a", "c"]);
    assert_eq!(id(&s, "a"), a);
    assert_eq!(s.slide_by_url("a").unwrap().status(), SlideStatus::Active);
    assert!(s.slide_by_url("b").is_none());
    assert!(s.foreign_slides().is_empty());

    let c = s.slide_by_url("c").unwrap();
    assert_eq!(c.position(), 1);
    assert!(matches!(c.status(), SlideStatus::Pending | SlideStatus::Loading));

    let effects = s.host_mut().drain();
    assert!(effects.contains(&Effect::Discard(b)));
    assert!(effects.contains(&Effect::Cancel(Timer::Slideshow)));
    assert!(!s.is_slider_ready());
}

#[test]
fn reused_visible_slide_skips_first_next() {
    let mut s = settled(&["a", "b"]);
    s.set_pictures(&["a", "c"]);
    load(&mut s, "c");
    assert!(s.is_slider_ready());
    s.host_mut().drain();

    // "a" is already on screen at position 0
    assert!(s.next(false, false));
    assert!(!s.is_in_transition());
    assert_eq!(s.current_index(), Some(0));

    assert!(s.next(false, false));
    assert!(s.is_in_transition());
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("c"));
}

#[test]
fn retired_slide_is_destroyed_after_transition() {
    let mut s = settled(&["a", "b"]);
    let a = id(&s, "a");
    s.set_pictures(&["c", "d"]);
    assert_eq!(s.length(), 2);
    assert_eq!(s.foreign_slides().len(), 1);
    assert!(s.foreign_slides()[0].is_foreign());

    load(&mut s, "c");
    assert!(s.is_slider_ready());
    assert!(s.next(false, false));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("c"));
    s.host_mut().drain();

    finish(&mut s);
    assert!(s.foreign_slides().is_empty());
    assert!(s.previous_slide().is_none());
    assert!(s.host_mut().drain().contains(&Effect::Discard(a)));
}

#[test]
fn picture_set_during_transition_is_deferred() {
    let mut s = settled(&["a", "b", "c"]);
    s.next(false, false);
    s.set_pictures(&["x"]);
    s.set_pictures(&["b", "y"]);
    assert!(s.has_deferred_pictures());
    assert_eq!(s.length(), 3);

    finish(&mut s);
    assert!(!s.has_deferred_pictures());
    assert_eq!(s.length(), 2);
    assert_eq!(s.slide_by_url("b").unwrap().position(), 0);
    assert!(s.slide_by_url("x").is_none());
}

#[test]
fn empty_and_duplicate_sets() {
    let mut s = settled(&["a", "b"]);
    s.set_pictures::<&str>(&[]);
    assert_eq!(s.length(), 2);

    s.set_pictures(&["b", "a", "b"]);
    assert_eq!(s.length(), 2);
    assert_eq!(positions(&s), vec![0, 1]);
    assert_eq!(s.slide_by_url("b").unwrap().position(), 0);
}

#[test]
fn failed_tail_target_falls_back_to_first() {
    let mut s = gallery(&["a", "b", "c"]);
    load(&mut s, "a");
    load(&mut s, "b");
    assert!(s.next(false, false));
    finish(&mut s);
    assert_eq!(s.current_index(), Some(1));
    // "c" was queued behind "b" and is still loading.
    assert_eq!(s.slide_by_url("c").unwrap().status(), SlideStatus::Loading);

    assert!(s.next(false, false));
    assert_eq!(s.pending_transition().map(|p| p.direction), Some(Direction::Next));
    fail(&mut s, "c");

    assert_eq!(s.length(), 2);
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("a"));
    assert_eq!(s.current_index(), Some(0));
    finish(&mut s);
    assert_eq!(s.current_index(), Some(0));
}

#[test]
fn fallback_onto_active_slide_is_dropped() {
    let mut s = gallery(&["a", "b"]);
    load(&mut s, "a");
    assert!(s.next(false, false));
    fail(&mut s, "b");
    assert_eq!(s.length(), 1);
    assert_eq!(s.pending_transition(), None);
    assert!(!s.is_in_transition());
    assert_eq!(s.current_index(), Some(0));
}

#[test]
fn failed_prev_target_retargets_backwards() {
    let mut s = gallery(&["a", "b", "c", "d"]);
    load(&mut s, "a");
    load(&mut s, "b");
    assert!(s.next(true, false));
    assert_eq!(s.current_index(), Some(1));
    // "c" is loading; ask for it, then lose it.
    assert!(s.slide_to(2, Direction::Prev, false));
    fail(&mut s, "c");
    // Prev fallback from position 1 is position 0.
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("a"));
}

#[test]
fn slideshow_stop_prevents_ticks() {
    let mut s = settled(&["a", "b"]);
    s.start_slideshow();
    assert!(s.is_slideshow_running());
    assert!(s.host_mut().drain().contains(&Effect::Arm {
        timer: Timer::Slideshow,
        after: Duration::from_secs(5)
    }));

    s.stop_slideshow();
    assert!(s.host_mut().drain().contains(&Effect::Cancel(Timer::Slideshow)));
    s.slideshow_tick();
    assert_eq!(s.current_index(), Some(0));
    assert!(!s.is_in_transition());
}

#[test]
fn slideshow_tick_advances_and_manual_next_stops_it() {
    let mut s = settled(&["a", "b", "c"]);
    s.start_slideshow();
    s.slideshow_tick();
    assert!(s.is_slideshow_running());
    assert_eq!(s.current_index(), Some(1));
    finish(&mut s);

    s.next(false, false);
    assert!(!s.is_slideshow_running());
}

#[test]
fn performance_mode_toggles_lightweight() {
    let mut s = settled(&["a", "b"]);
    s.next(false, false);
    assert!(s.is_lightweight());
    finish(&mut s);
    let effects = s.host_mut().drain();
    assert!(effects.contains(&Effect::Arm {
        timer: Timer::PerformanceIdle,
        after: Duration::from_millis(50)
    }));
    s.performance_idle();
    assert!(!s.is_lightweight());
}

#[test]
fn resize_relayouts_visible_slide() {
    let mut s = settled(&["a", "b"]);
    s.host_mut().set_container(Size::new(400.0, 600.0));
    s.resize();
    let a = id(&s, "a");
    let layout = s
        .host_mut()
        .drain()
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Layout { slide, placement } if slide == a => Some(placement),
            _ => None,
        })
        .unwrap();
    // 4:3 picture covering a portrait container
    assert_eq!((layout.width, layout.height), (800.0, 600.0));
    assert_eq!(layout.left, Some(-200.0));
}

#[test]
fn base_path_prefixes_fetch_url() {
    let options = GalleryOptions {
        base_path: "albums/".into(),
        ..GalleryOptions::default()
    };
    let mut s = GallerySession::new(EffectQueue::new(Size::new(10.0, 10.0)), options);
    s.set_pictures(&["2024/a.jpg"]);
    assert!(s.host_mut().drain().iter().any(|effect| matches!(
        effect,
        Effect::Fetch { url, .. } if url == "albums/2024/a.jpg"
    )));
}

#[test]
fn late_outcome_for_removed_slide_is_discarded() {
    let mut s = gallery(&["a", "b"]);
    load(&mut s, "a");
    let b = id(&s, "b");
    s.set_pictures(&["a"]);
    s.host_mut().drain();

    s.image_loaded(b, LANDSCAPE);
    assert!(s.host_mut().drain().contains(&Effect::Discard(b)));
    assert_eq!(s.length(), 1);
    assert_eq!(s.outstanding_loads(), 0);
}

#[test]
fn sole_new_slide_failing_still_enables_navigation() {
    let mut s = settled(&["a", "b"]);
    s.set_pictures(&["a", "b", "x"]);
    assert!(!s.is_slider_ready());

    fail(&mut s, "x");
    assert_eq!(s.length(), 2);
    assert_eq!(s.outstanding_loads(), 0);
    assert!(s.is_slider_ready());
    let emitted = events(&mut s);
    assert!(emitted.contains(&GalleryEvent::PictureSetReady));

    // "a" stayed on screen at position 0, so the first step is absorbed.
    assert!(s.next(false, false));
    assert_eq!(s.current_index(), Some(0));
    assert!(s.next(false, false));
    assert!(s.is_in_transition());
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("b"));
}

#[test]
fn every_pending_slide_failing_still_enables_navigation() {
    let mut s = settled(&["a"]);
    s.set_pictures(&["a", "x", "y"]);
    fail(&mut s, "x");
    assert!(!s.is_slider_ready());
    // "y" was queued once the slot freed up
    assert_eq!(s.slide_by_url("y").unwrap().status(), SlideStatus::Loading);

    fail(&mut s, "y");
    assert_eq!(s.length(), 1);
    assert!(s.is_slider_ready());
    assert!(s.next(false, false));
}

#[test]
fn failed_first_slide_launches_the_next_loaded_one() {
    let mut s = gallery(&["a", "b"]);
    // "a" is in flight when the order changes.
    s.set_pictures(&["b", "a"]);
    load(&mut s, "a");
    assert!(!s.is_ready());

    fail(&mut s, "b");
    assert_eq!(s.slide_by_url("a").unwrap().position(), 0);
    assert!(s.is_ready());
    assert!(s.is_slider_ready());
    assert_eq!(s.current_index(), Some(0));
    assert_eq!(s.active_slide().map(|slide| slide.url()), Some("a"));
}

#[test]
fn reused_unfetched_slide_loads_first() {
    let mut s = gallery(&["a", "b", "c"]);
    load(&mut s, "a");
    // "b" is fetching, "c" has never been requested.
    assert_eq!(s.slide_by_url("c").unwrap().status(), SlideStatus::Pending);
    let c = id(&s, "c");
    s.host_mut().drain();

    s.set_pictures(&["c", "a"]);
    assert_eq!(id(&s, "c"), c);
    let c_slide = s.slide_by_url("c").unwrap();
    assert_eq!(c_slide.status(), SlideStatus::Loading);
    assert!(c_slide.is_announced());
    assert!(s.host_mut().drain().iter().any(|effect| matches!(
        effect,
        Effect::Fetch { slide, .. } if *slide == c
    )));

    load(&mut s, "c");
    assert!(s.is_slider_ready());
}
