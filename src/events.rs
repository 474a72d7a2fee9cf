use std::cell::RefCell;
use std::rc::Rc;

/// Events exchanged between the host player, its ad overlays, and the
/// coordinator.
///
/// The host fires the playback-facing kinds; the coordinator fires the
/// ad lifecycle kinds; overlay widgets forward their clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    /// Content playback was requested for the first time
    Play,
    /// The host swapped in new content
    ContentChanged,
    /// The host reached the preroll checkpoint
    ReadyForPreroll,
    /// Resolution succeeded; an ad is available
    AdsReady,
    /// No ad is available for this play attempt
    AdsCanceled,
    /// A linear ad session started
    AdStarted,
    /// Ad playback started or resumed
    AdPlay,
    /// The ad media source can play
    AdCanPlay,
    /// Ad playback position advanced
    AdTimeUpdate,
    /// Ad playback paused
    AdPause,
    /// The ad media source failed to play
    AdError,
    /// Ad volume or mute flag changed
    AdVolumeChange,
    /// The player entered or left fullscreen
    FullscreenChange,
    /// The ad finished, was skipped, or failed; drives teardown
    AdEnded,
    /// Teardown finished and the player state is restored
    SessionDone,
    /// The click blocker overlay was clicked
    BlockerClicked,
    /// The skip button overlay was clicked
    SkipClicked,
}

type Callback = Rc<RefCell<dyn FnMut()>>;

struct Entry {
    id: u64,
    event: PlayerEvent,
    once: bool,
    callback: Callback,
}

/// Handle identifying one registered listener; pass to [`EventBus::off`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    id: u64,
    event: PlayerEvent,
}

impl ListenerHandle {
    pub fn event(&self) -> PlayerEvent {
        self.event
    }
}

/// Single-threaded event channel with persistent and one-shot listeners.
///
/// Dispatch snapshots the matching listeners before invoking any of
/// them, so a handler may trigger further events or unsubscribe
/// reentrantly. One-shot listeners are retired before their callback
/// runs. `off` on an already-retired handle is a no-op.
#[derive(Default)]
pub struct EventBus {
    inner: RefCell<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    entries: Vec<Entry>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register a persistent listener
    pub fn on(&self, event: PlayerEvent, callback: impl FnMut() + 'static) -> ListenerHandle {
        self.register(event, false, callback)
    }

    /// Register a listener that fires at most once
    pub fn once(&self, event: PlayerEvent, callback: impl FnMut() + 'static) -> ListenerHandle {
        self.register(event, true, callback)
    }

    fn register(
        &self,
        event: PlayerEvent,
        once: bool,
        callback: impl FnMut() + 'static,
    ) -> ListenerHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push(Entry {
            id,
            event,
            once,
            callback: Rc::new(RefCell::new(callback)),
        });
        ListenerHandle { id, event }
    }

    /// Remove a listener; unknown or already-retired handles are ignored
    pub fn off(&self, handle: &ListenerHandle) {
        self.inner
            .borrow_mut()
            .entries
            .retain(|entry| entry.id != handle.id);
    }

    /// Number of live listeners for one event kind
    pub fn listener_count(&self, event: PlayerEvent) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.event == event)
            .count()
    }

    /// Fire an event, invoking every matching listener in registration
    /// order
    pub fn trigger(&self, event: PlayerEvent) {
        let ready: Vec<Callback> = {
            let mut inner = self.inner.borrow_mut();
            let ready = inner
                .entries
                .iter()
                .filter(|entry| entry.event == event)
                .map(|entry| entry.callback.clone())
                .collect();
            inner
                .entries
                .retain(|entry| !(entry.event == event && entry.once));
            ready
        };

        for callback in ready {
            (callback.borrow_mut())();
        }
    }
}
