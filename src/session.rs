use crate::bridge;
use crate::config::AdsOptions;
use crate::error::Result;
use crate::events::{EventBus, ListenerHandle, PlayerEvent};
use crate::models::{AdRequest, LinearAdSelection};
use crate::player::{OverlayId, OverlayKind, OverlaySlot, PlayerSurface};
use crate::resolver;
use crate::tracker::{AdTracker, TrackerAdapter};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Player configuration captured at session start and restored at
/// teardown, exactly once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub controls_enabled: bool,
    pub seek_enabled: bool,
}

/// Session controller states.
///
/// The terminal state equals the initial state: the controller is
/// reusable across sequential sessions, at most one active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Resolving,
    Ready,
    Playing,
    Ending,
}

/// Builds the tracker bound to the resolved ad/creative/companion triple
pub type TrackerFactory = Box<dyn Fn(&LinearAdSelection) -> Box<dyn AdTracker>>;

/// One linear ad occupying the player.
///
/// Owns every overlay and listener created while the ad plays, plus the
/// interaction shadow state the event bridge updates. Destroyed exactly
/// once at teardown.
pub struct AdSession {
    pub(crate) snapshot: PlayerSnapshot,
    pub(crate) tracker: RefCell<TrackerAdapter>,
    pub(crate) overlays: RefCell<Vec<OverlayId>>,
    pub(crate) listeners: RefCell<Vec<ListenerHandle>>,
    pub(crate) error_occurred: Cell<bool>,
    pub(crate) previous_muted: Cell<bool>,
    pub(crate) previous_volume: Cell<f64>,
    pub(crate) skip_button: OverlayId,
    skip_activated: Cell<bool>,
    ended: Cell<bool>,
}

impl AdSession {
    pub(crate) fn new(
        snapshot: PlayerSnapshot,
        tracker: TrackerAdapter,
        overlays: Vec<OverlayId>,
        skip_button: OverlayId,
        previous_muted: bool,
        previous_volume: f64,
    ) -> Self {
        AdSession {
            snapshot,
            tracker: RefCell::new(tracker),
            overlays: RefCell::new(overlays),
            listeners: RefCell::new(Vec::new()),
            error_occurred: Cell::new(false),
            previous_muted: Cell::new(previous_muted),
            previous_volume: Cell::new(previous_volume),
            skip_button,
            skip_activated: Cell::new(false),
            ended: Cell::new(false),
        }
    }
}

/// Coordinates linear ad playback against one host player.
///
/// Listens for the host's play trigger and preroll checkpoint, resolves
/// the configured ad, and runs one [`AdSession`] at a time.
pub struct AdPlayback {
    inner: Rc<PlaybackInner>,
}

struct PlaybackInner {
    player: Rc<dyn PlayerSurface>,
    bus: Rc<EventBus>,
    options: AdsOptions,
    tracker_factory: TrackerFactory,
    state: Cell<PlaybackState>,
    selection: RefCell<Option<LinearAdSelection>>,
    preroll_requested: Cell<bool>,
    session: RefCell<Option<Rc<AdSession>>>,
    play_listener: RefCell<Option<ListenerHandle>>,
}

impl AdPlayback {
    /// Wire the coordinator onto a player and its event bus.
    pub fn attach(
        player: Rc<dyn PlayerSurface>,
        bus: Rc<EventBus>,
        options: AdsOptions,
        tracker_factory: TrackerFactory,
    ) -> Self {
        let inner = Rc::new(PlaybackInner {
            player,
            bus: bus.clone(),
            options,
            tracker_factory,
            state: Cell::new(PlaybackState::Idle),
            selection: RefCell::new(None),
            preroll_requested: Cell::new(false),
            session: RefCell::new(None),
            play_listener: RefCell::new(None),
        });

        PlaybackInner::arm_play_listener(&inner);

        let weak = Rc::downgrade(&inner);
        bus.on(PlayerEvent::ReadyForPreroll, move || {
            if let Some(inner) = weak.upgrade() {
                PlaybackInner::handle_ready_for_preroll(&inner);
            }
        });

        let weak = Rc::downgrade(&inner);
        bus.on(PlayerEvent::ContentChanged, move || {
            if let Some(inner) = weak.upgrade() {
                PlaybackInner::handle_content_changed(&inner);
            }
        });

        AdPlayback { inner }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.get()
    }

    pub fn session_active(&self) -> bool {
        self.inner.session.borrow().is_some()
    }
}

impl PlaybackInner {
    fn set_state(&self, next: PlaybackState) {
        let previous = self.state.replace(next);
        if previous != next {
            debug!("ad playback state {previous:?} -> {next:?}");
        }
    }

    /// Arm the one-shot play trigger, replacing any previous one.
    fn arm_play_listener(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let handle = this.bus.once(PlayerEvent::Play, move || {
            if let Some(inner) = weak.upgrade() {
                *inner.play_listener.borrow_mut() = None;
                Self::handle_play(&inner);
            }
        });
        if let Some(old) = this.play_listener.borrow_mut().replace(handle) {
            this.bus.off(&old);
        }
    }

    fn handle_play(this: &Rc<Self>) {
        // A stale content error would block the ad source swap
        this.player.clear_error();

        if this.state.get() != PlaybackState::Idle {
            return;
        }
        match this.options.request() {
            Some(request) => Self::begin_resolution(this, request),
            None => debug!("no ad configuration; preroll will be canceled"),
        }
    }

    fn begin_resolution(this: &Rc<Self>, request: AdRequest) {
        this.set_state(PlaybackState::Resolving);
        match request {
            AdRequest::Document(document) => {
                let result = resolver::resolve_document(&document, &this.options);
                Self::finish_resolution(this, result);
            }
            AdRequest::Url(url) => {
                let weak = Rc::downgrade(this);
                let options = this.options.clone();
                tokio::task::spawn_local(async move {
                    let result = resolver::resolve_url(&url, &options).await;
                    if let Some(inner) = weak.upgrade() {
                        Self::finish_resolution(&inner, result);
                    }
                });
            }
        }
    }

    fn finish_resolution(this: &Rc<Self>, result: Result<LinearAdSelection>) {
        match result {
            Ok(selection) => {
                info!(
                    "ad resolved: {} media source(s), companion: {}",
                    selection.media_sources.len(),
                    selection.companion.is_some()
                );
                if let Some(companion) = &selection.companion {
                    this.player
                        .mount_companion(&companion.element_id, &companion.markup);
                }
                *this.selection.borrow_mut() = Some(selection);
                this.set_state(PlaybackState::Ready);
                this.bus.trigger(PlayerEvent::AdsReady);
                if this.preroll_requested.get() {
                    Self::start_session(this);
                }
            }
            Err(err) => {
                warn!("ad resolution failed: {err}");
                this.set_state(PlaybackState::Idle);
                this.bus.trigger(PlayerEvent::AdsCanceled);
            }
        }
    }

    fn handle_ready_for_preroll(this: &Rc<Self>) {
        if this.options.request().is_none() {
            this.bus.trigger(PlayerEvent::AdsCanceled);
            return;
        }

        this.preroll_requested.set(true);
        if this.state.get() == PlaybackState::Ready {
            Self::start_session(this);
        }
    }

    fn handle_content_changed(this: &Rc<Self>) {
        debug!("content changed");
        if this.state.get() != PlaybackState::Idle {
            return;
        }
        *this.selection.borrow_mut() = None;
        this.preroll_requested.set(false);
        Self::arm_play_listener(this);
    }

    /// Enter linear ad mode. Requires a resolved selection and the
    /// preroll checkpoint; runs at most once per play attempt.
    fn start_session(this: &Rc<Self>) {
        if this.state.get() != PlaybackState::Ready || this.session.borrow().is_some() {
            return;
        }
        let Some(selection) = this.selection.borrow().clone() else {
            return;
        };

        this.set_state(PlaybackState::Playing);

        let player = &this.player;
        let snapshot = PlayerSnapshot {
            controls_enabled: player.controls_enabled(),
            seek_enabled: player.seek_enabled(),
        };
        player.set_controls_enabled(this.options.controls_enabled);
        player.set_seek_enabled(this.options.seek_enabled);
        player.switch_source(&selection.media_sources);

        let blocker = player.install_overlay(OverlayKind::Blocker, OverlaySlot::BeforeControlBar);
        let skip_button = player.install_overlay(OverlayKind::SkipButton, OverlaySlot::PlayerRoot);
        player.set_overlay_visible(skip_button, false);

        let tracker = TrackerAdapter::new((this.tracker_factory)(&selection), selection.duration);
        let session = Rc::new(AdSession::new(
            snapshot,
            tracker,
            vec![blocker, skip_button],
            skip_button,
            player.is_muted(),
            player.volume(),
        ));
        *this.session.borrow_mut() = Some(session.clone());

        this.install_blocker_behavior(&session);
        this.install_skip_behavior(&session);
        bridge::install(&this.bus, &this.player, &session);

        let weak = Rc::downgrade(this);
        let ended = this.bus.once(PlayerEvent::AdEnded, move || {
            if let Some(inner) = weak.upgrade() {
                inner.end_session();
            }
        });
        session.listeners.borrow_mut().push(ended);

        this.bus.trigger(PlayerEvent::AdStarted);
    }

    /// Blocker clicks resume a paused ad; during playback they are
    /// creative clicks whose destination opens in a new context.
    fn install_blocker_behavior(&self, session: &Rc<AdSession>) {
        let player = self.player.clone();
        let session_ref = session.clone();
        let handle = self.bus.on(PlayerEvent::BlockerClicked, move || {
            if player.is_paused() {
                player.play();
                return;
            }
            let destination = session_ref.tracker.borrow_mut().click();
            if let Some(url) = destination {
                player.open_url(&url);
            }
        });
        session.listeners.borrow_mut().push(handle);
    }

    /// Skip policy: the button appears on the first ad play when the
    /// configured offset fits inside the ad, counts down on every time
    /// update, and activates exactly once at the offset. Clicks before
    /// activation have no tracking effect.
    fn install_skip_behavior(&self, session: &Rc<AdSession>) {
        let weak_bus = Rc::downgrade(&self.bus);
        let session_ref = session.clone();
        let handle = self.bus.on(PlayerEvent::SkipClicked, move || {
            if !session_ref.skip_activated.get() {
                return;
            }
            session_ref.tracker.borrow_mut().skip();
            // Every exit routes through the single ad-ended signal
            if let Some(bus) = weak_bus.upgrade() {
                bus.trigger(PlayerEvent::AdEnded);
            }
        });
        session.listeners.borrow_mut().push(handle);

        let Some(offset) = self.options.skip_offset_seconds.filter(|o| *o > 0.0) else {
            return;
        };

        let weak_bus = Rc::downgrade(&self.bus);
        let player = self.player.clone();
        let session_ref = session.clone();
        let handle = self.bus.once(PlayerEvent::AdPlay, move || {
            // NaN duration (source not loaded) keeps the button hidden
            if !(player.duration() >= offset) {
                return;
            }
            player.set_overlay_visible(session_ref.skip_button, true);

            let Some(bus) = weak_bus.upgrade() else {
                return;
            };
            let countdown_player = player.clone();
            let countdown_session = session_ref.clone();
            let countdown = bus.on(PlayerEvent::AdTimeUpdate, move || {
                countdown_player.hide_spinner();
                let remaining = (offset - countdown_player.current_time()).ceil();
                if remaining > 0.0 {
                    countdown_player.set_overlay_label(
                        countdown_session.skip_button,
                        &format!("Skip in {}...", remaining as i64),
                    );
                } else if !countdown_session.skip_activated.replace(true) {
                    countdown_player.set_overlay_label(countdown_session.skip_button, "Skip");
                    countdown_player.set_overlay_interactive(countdown_session.skip_button, true);
                }
            });
            session_ref.listeners.borrow_mut().push(countdown);
        });
        session.listeners.borrow_mut().push(handle);
    }

    /// Tear the session down: remove owned overlays, unregister owned
    /// listeners, restore the snapshot, then signal done exactly once.
    fn end_session(&self) {
        let Some(session) = self.session.borrow_mut().take() else {
            return;
        };
        if session.ended.replace(true) {
            return;
        }
        self.set_state(PlaybackState::Ending);

        for overlay in session.overlays.borrow_mut().drain(..) {
            self.player.remove_overlay(overlay);
        }
        for listener in session.listeners.borrow_mut().drain(..) {
            self.bus.off(&listener);
        }

        self.player
            .set_controls_enabled(session.snapshot.controls_enabled);
        self.player.set_seek_enabled(session.snapshot.seek_enabled);

        *self.selection.borrow_mut() = None;
        self.preroll_requested.set(false);
        self.set_state(PlaybackState::Idle);

        debug!("ad session torn down");
        self.bus.trigger(PlayerEvent::SessionDone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompanionOptions;
    use crate::models::*;
    use crate::player::fake::FakePlayer;
    use crate::tracker::recording::{RecordingTracker, TrackCall};
    use std::cell::Cell;

    struct Harness {
        bus: Rc<EventBus>,
        player: Rc<FakePlayer>,
        playback: AdPlayback,
        calls: Rc<RefCell<Vec<TrackCall>>>,
    }

    fn setup(options: AdsOptions) -> Harness {
        let bus = EventBus::new();
        let player = Rc::new(FakePlayer::new());
        let calls = Rc::new(RefCell::new(Vec::new()));
        let factory_calls = calls.clone();
        let playback = AdPlayback::attach(
            player.clone(),
            bus.clone(),
            options,
            Box::new(move |_selection| {
                Box::new(RecordingTracker::with_calls(factory_calls.clone()))
            }),
        );
        Harness {
            bus,
            player,
            playback,
            calls,
        }
    }

    fn count_of(calls: &RefCell<Vec<TrackCall>>, call: &TrackCall) -> usize {
        calls.borrow().iter().filter(|c| *c == call).count()
    }

    fn counter(bus: &Rc<EventBus>, event: PlayerEvent) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        bus.on(event, move || c.set(c.get() + 1));
        count
    }

    fn sample_document() -> Vast {
        Vast {
            version: "3.0".into(),
            ads: vec![Ad {
                id: Some("ad-1".into()),
                sequence: None,
                inline: Some(InLine {
                    ad_system: AdSystem {
                        name: "Example".into(),
                        version: None,
                    },
                    ad_title: "Preroll".into(),
                    impressions: Vec::new(),
                    error_url: None,
                    creatives: vec![
                        Creative {
                            id: Some("cr-1".into()),
                            sequence: None,
                            ad_id: None,
                            linear: Some(Linear {
                                duration: None,
                                media_files: vec![
                                    MediaFile {
                                        url: "https://ads.example/a.mp4".into(),
                                        mime_type: "video/mp4".into(),
                                        codec: None,
                                        bitrate: None,
                                        width: None,
                                        height: None,
                                        delivery: None,
                                    },
                                    MediaFile {
                                        url: "https://ads.example/b.webm".into(),
                                        mime_type: "video/webm".into(),
                                        codec: None,
                                        bitrate: None,
                                        width: None,
                                        height: None,
                                        delivery: None,
                                    },
                                ],
                                video_clicks: None,
                                tracking_events: Vec::new(),
                            }),
                            companion_ads: None,
                        },
                        Creative {
                            id: Some("cr-2".into()),
                            sequence: None,
                            ad_id: None,
                            linear: None,
                            companion_ads: Some(CompanionAds {
                                variations: vec![CompanionVariation {
                                    id: None,
                                    width: "300".into(),
                                    height: "250".into(),
                                    mime_type: Some("image/png".into()),
                                    static_resource: Some("https://ads.example/banner.png".into()),
                                    iframe_resource: None,
                                    html_resource: None,
                                    click_through: None,
                                    tracking_events: Vec::new(),
                                }],
                            }),
                        },
                    ],
                }),
                wrapper: None,
            }],
        }
    }

    fn document_options() -> AdsOptions {
        AdsOptions {
            document: Some(sample_document()),
            ..AdsOptions::default()
        }
    }

    fn start_session(harness: &Harness) {
        harness.bus.trigger(PlayerEvent::Play);
        harness.bus.trigger(PlayerEvent::ReadyForPreroll);
        assert_eq!(harness.playback.state(), PlaybackState::Playing);
    }

    #[test]
    fn preroll_without_configuration_cancels() {
        let harness = setup(AdsOptions::default());
        let canceled = counter(&harness.bus, PlayerEvent::AdsCanceled);

        harness.bus.trigger(PlayerEvent::ReadyForPreroll);

        assert_eq!(canceled.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Idle);
        assert!(!harness.playback.session_active());
    }

    #[test]
    fn resolution_failure_cancels_and_returns_to_idle() {
        let harness = setup(AdsOptions {
            document: Some(Vast {
                version: "3.0".into(),
                ads: Vec::new(),
            }),
            ..AdsOptions::default()
        });
        let canceled = counter(&harness.bus, PlayerEvent::AdsCanceled);

        harness.bus.trigger(PlayerEvent::Play);

        assert_eq!(canceled.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Idle);
        harness.bus.trigger(PlayerEvent::ReadyForPreroll);
        assert!(!harness.playback.session_active());
    }

    #[test]
    fn session_starts_when_play_precedes_preroll() {
        let harness = setup(document_options());
        let ready = counter(&harness.bus, PlayerEvent::AdsReady);
        let started = counter(&harness.bus, PlayerEvent::AdStarted);

        harness.bus.trigger(PlayerEvent::Play);
        assert_eq!(ready.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Ready);

        harness.bus.trigger(PlayerEvent::ReadyForPreroll);
        assert_eq!(started.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Playing);

        let state = harness.player.state.borrow();
        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.sources[0].url, "https://ads.example/a.mp4");
        assert!(!state.controls_enabled);
        assert!(!state.seek_enabled);
        drop(state);

        assert!(harness.player.overlay(OverlayKind::Blocker).is_some());
        let skip = harness.player.overlay(OverlayKind::SkipButton).unwrap();
        assert!(!skip.visible);
    }

    #[test]
    fn session_starts_once_when_preroll_precedes_resolution() {
        let harness = setup(document_options());
        let started = counter(&harness.bus, PlayerEvent::AdStarted);

        harness.bus.trigger(PlayerEvent::ReadyForPreroll);
        assert_eq!(harness.playback.state(), PlaybackState::Idle);

        harness.bus.trigger(PlayerEvent::Play);
        assert_eq!(started.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Playing);

        // A duplicate checkpoint must not start a second session
        harness.bus.trigger(PlayerEvent::ReadyForPreroll);
        assert_eq!(started.get(), 1);
    }

    #[test]
    fn teardown_is_idempotent_under_duplicate_ad_ended() {
        let harness = setup(document_options());
        let done = counter(&harness.bus, PlayerEvent::SessionDone);
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdEnded);
        harness.bus.trigger(PlayerEvent::AdEnded);
        harness.bus.trigger(PlayerEvent::AdEnded);

        assert_eq!(done.get(), 1);
        assert_eq!(harness.playback.state(), PlaybackState::Idle);
        // Blocker and skip button removed exactly once each
        assert_eq!(harness.player.state.borrow().remove_calls, 2);
        assert_eq!(harness.player.live_overlay_count(), 0);
        assert_eq!(count_of(&harness.calls, &TrackCall::Complete), 1);
    }

    #[test]
    fn snapshot_is_restored_on_teardown() {
        let harness = setup(document_options());
        {
            let mut state = harness.player.state.borrow_mut();
            state.controls_enabled = true;
            state.seek_enabled = false;
        }
        start_session(&harness);
        {
            let state = harness.player.state.borrow();
            assert!(!state.controls_enabled);
            assert!(!state.seek_enabled);
        }

        harness.bus.trigger(PlayerEvent::AdEnded);

        let state = harness.player.state.borrow();
        assert!(state.controls_enabled);
        assert!(!state.seek_enabled);
    }

    #[test]
    fn snapshot_is_restored_after_a_playback_error() {
        let harness = setup(document_options());
        {
            let mut state = harness.player.state.borrow_mut();
            state.controls_enabled = true;
            state.seek_enabled = false;
        }
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdError);

        let state = harness.player.state.borrow();
        assert!(state.controls_enabled);
        assert!(!state.seek_enabled);
        drop(state);
        assert_eq!(harness.playback.state(), PlaybackState::Idle);
    }

    #[test]
    fn error_is_tracked_hidden_and_suppresses_complete() {
        let harness = setup(document_options());
        start_session(&harness);
        let cleared_before = harness.player.state.borrow().errors_cleared;

        harness.bus.trigger(PlayerEvent::AdError);

        assert_eq!(count_of(&harness.calls, &TrackCall::Error(405)), 1);
        assert_eq!(count_of(&harness.calls, &TrackCall::Complete), 0);
        assert!(harness.player.state.borrow().errors_cleared > cleared_before);
        assert!(!harness.playback.session_active());
    }

    #[test]
    fn impression_fires_on_ad_can_play() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdCanPlay);

        assert_eq!(count_of(&harness.calls, &TrackCall::Impression), 1);
    }

    #[test]
    fn pause_and_resume_report_once_each() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdPause);
        harness.bus.trigger(PlayerEvent::AdPlay);
        harness.bus.trigger(PlayerEvent::AdPlay);

        assert_eq!(count_of(&harness.calls, &TrackCall::Paused(true)), 1);
        assert_eq!(count_of(&harness.calls, &TrackCall::Paused(false)), 1);
    }

    #[test]
    fn progress_latches_player_duration_lazily() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.player.state.borrow_mut().current_time = 1.0;
        harness.bus.trigger(PlayerEvent::AdTimeUpdate);
        {
            let mut state = harness.player.state.borrow_mut();
            state.current_time = 2.0;
            state.duration = 10.0;
        }
        harness.bus.trigger(PlayerEvent::AdTimeUpdate);

        let calls = harness.calls.borrow();
        assert!(matches!(calls[0], TrackCall::Progress(t, d) if t == 1.0 && d.is_nan()));
        assert_eq!(calls[1], TrackCall::Progress(2.0, 10.0));
    }

    #[test]
    fn fullscreen_changes_report_current_state() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.player.state.borrow_mut().fullscreen = true;
        harness.bus.trigger(PlayerEvent::FullscreenChange);
        harness.player.state.borrow_mut().fullscreen = false;
        harness.bus.trigger(PlayerEvent::FullscreenChange);

        assert_eq!(count_of(&harness.calls, &TrackCall::Fullscreen(true)), 1);
        assert_eq!(count_of(&harness.calls, &TrackCall::Fullscreen(false)), 1);
    }

    #[test]
    fn volume_crossing_zero_reports_mute_edges_only() {
        let harness = setup(document_options());
        harness.player.state.borrow_mut().volume = 0.5;
        start_session(&harness);

        for volume in [0.3, 0.0, 0.0, 0.4] {
            harness.player.state.borrow_mut().volume = volume;
            harness.bus.trigger(PlayerEvent::AdVolumeChange);
        }

        let mutes: Vec<TrackCall> = harness
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, TrackCall::Muted(_)))
            .cloned()
            .collect();
        assert_eq!(mutes, vec![TrackCall::Muted(true), TrackCall::Muted(false)]);
    }

    #[test]
    fn mute_flag_changes_win_over_volume_changes() {
        let harness = setup(document_options());
        start_session(&harness);

        {
            let mut state = harness.player.state.borrow_mut();
            state.muted = true;
            state.volume = 0.0;
        }
        harness.bus.trigger(PlayerEvent::AdVolumeChange);
        harness.player.state.borrow_mut().muted = false;
        harness.bus.trigger(PlayerEvent::AdVolumeChange);

        let mutes: Vec<TrackCall> = harness
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, TrackCall::Muted(_)))
            .cloned()
            .collect();
        assert_eq!(mutes, vec![TrackCall::Muted(true), TrackCall::Muted(false)]);
    }

    #[test]
    fn blocker_click_resumes_when_paused_without_tracking() {
        let harness = setup(document_options());
        start_session(&harness);
        harness.player.state.borrow_mut().paused = true;

        harness.bus.trigger(PlayerEvent::BlockerClicked);

        assert_eq!(harness.player.state.borrow().play_calls, 1);
        assert_eq!(count_of(&harness.calls, &TrackCall::Click), 0);
    }

    #[test]
    fn blocker_click_during_playback_opens_the_destination() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::BlockerClicked);

        assert_eq!(count_of(&harness.calls, &TrackCall::Click), 1);
        assert_eq!(
            harness.player.state.borrow().opened_urls,
            vec!["https://brand.example/landing".to_string()]
        );
    }

    #[test]
    fn skip_button_counts_down_then_activates_once() {
        let harness = setup(AdsOptions {
            skip_offset_seconds: Some(5.0),
            ..document_options()
        });
        harness.player.state.borrow_mut().duration = 10.0;
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdPlay);
        let skip = harness.player.overlay(OverlayKind::SkipButton).unwrap();
        assert!(skip.visible);
        assert!(!skip.interactive);

        harness.player.state.borrow_mut().current_time = 3.0;
        harness.bus.trigger(PlayerEvent::AdTimeUpdate);
        let skip = harness.player.overlay(OverlayKind::SkipButton).unwrap();
        assert_eq!(skip.label, "Skip in 2...");
        assert!(!skip.interactive);

        // A click before activation tracks nothing
        harness.bus.trigger(PlayerEvent::SkipClicked);
        assert_eq!(count_of(&harness.calls, &TrackCall::Skip), 0);
        assert!(harness.playback.session_active());

        harness.player.state.borrow_mut().current_time = 5.0;
        harness.bus.trigger(PlayerEvent::AdTimeUpdate);
        let skip = harness.player.overlay(OverlayKind::SkipButton).unwrap();
        assert_eq!(skip.label, "Skip");
        assert!(skip.interactive);
        assert!(harness.player.state.borrow().spinner_hidden);

        harness.bus.trigger(PlayerEvent::SkipClicked);
        assert_eq!(count_of(&harness.calls, &TrackCall::Skip), 1);
        assert!(!harness.playback.session_active());
        assert_eq!(harness.playback.state(), PlaybackState::Idle);

        // A second click after teardown goes nowhere
        harness.bus.trigger(PlayerEvent::SkipClicked);
        assert_eq!(count_of(&harness.calls, &TrackCall::Skip), 1);
    }

    #[test]
    fn skip_button_stays_hidden_when_the_ad_is_too_short() {
        let harness = setup(AdsOptions {
            skip_offset_seconds: Some(30.0),
            ..document_options()
        });
        harness.player.state.borrow_mut().duration = 10.0;
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdPlay);

        let skip = harness.player.overlay(OverlayKind::SkipButton).unwrap();
        assert!(!skip.visible);
    }

    #[test]
    fn companion_mounts_on_resolution() {
        let harness = setup(AdsOptions {
            companion: Some(CompanionOptions {
                element_id: "side-banner".into(),
                max_width: 300,
                max_height: 250,
            }),
            ..document_options()
        });

        harness.bus.trigger(PlayerEvent::Play);

        let state = harness.player.state.borrow();
        assert_eq!(state.companions.len(), 1);
        assert_eq!(state.companions[0].0, "side-banner");
        assert!(matches!(
            state.companions[0].1,
            CompanionMarkup::Image { .. }
        ));
    }

    #[test]
    fn natural_end_completes_exactly_once() {
        let harness = setup(document_options());
        start_session(&harness);

        harness.bus.trigger(PlayerEvent::AdCanPlay);
        harness.bus.trigger(PlayerEvent::AdEnded);

        assert_eq!(count_of(&harness.calls, &TrackCall::Complete), 1);
    }

    #[test]
    fn bridge_listeners_are_gone_after_teardown() {
        let harness = setup(document_options());
        start_session(&harness);
        harness.bus.trigger(PlayerEvent::AdEnded);

        // Tracking signals after teardown must go nowhere
        harness.bus.trigger(PlayerEvent::AdCanPlay);
        harness.bus.trigger(PlayerEvent::AdPause);
        harness.bus.trigger(PlayerEvent::AdVolumeChange);
        harness.bus.trigger(PlayerEvent::BlockerClicked);

        assert_eq!(count_of(&harness.calls, &TrackCall::Impression), 0);
        assert_eq!(count_of(&harness.calls, &TrackCall::Paused(true)), 0);
        assert_eq!(count_of(&harness.calls, &TrackCall::Click), 0);
        assert_eq!(harness.bus.listener_count(PlayerEvent::AdTimeUpdate), 0);
        assert_eq!(harness.bus.listener_count(PlayerEvent::AdEnded), 0);
    }

    #[test]
    fn content_change_rearms_the_next_preroll() {
        let harness = setup(document_options());
        let started = counter(&harness.bus, PlayerEvent::AdStarted);
        start_session(&harness);
        harness.bus.trigger(PlayerEvent::AdEnded);
        assert_eq!(started.get(), 1);

        harness.bus.trigger(PlayerEvent::ContentChanged);
        harness.bus.trigger(PlayerEvent::Play);
        harness.bus.trigger(PlayerEvent::ReadyForPreroll);

        assert_eq!(started.get(), 2);
        assert_eq!(harness.playback.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn url_requests_resolve_through_the_local_task() {
        use rand::distributions::Alphanumeric;
        use rand::{Rng, thread_rng};

        let suffix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let path = std::env::temp_dir().join(format!("vast-playback-session-{suffix}.xml"));
        std::fs::write(
            &path,
            r#"<VAST version="3.0">
  <Ad id="ad-1">
    <InLine>
      <AdSystem>S</AdSystem>
      <AdTitle>T</AdTitle>
      <Creatives>
        <Creative><Linear>
          <Duration>00:00:10</Duration>
          <MediaFiles>
            <MediaFile type="video/mp4"><![CDATA[https://ads.example/a.mp4]]></MediaFile>
          </MediaFiles>
        </Linear></Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#,
        )
        .unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let harness = setup(AdsOptions {
                    url: Some(path.to_str().unwrap().to_string()),
                    ..AdsOptions::default()
                });

                harness.bus.trigger(PlayerEvent::ReadyForPreroll);
                harness.bus.trigger(PlayerEvent::Play);
                assert_eq!(harness.playback.state(), PlaybackState::Resolving);

                // Let the resolution task run to completion
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }

                assert_eq!(harness.playback.state(), PlaybackState::Playing);
                assert_eq!(harness.player.state.borrow().sources.len(), 1);
            })
            .await;

        std::fs::remove_file(path).ok();
    }
}
