use log::debug;

/// VAST error code reported when a media file fails to play
pub const MEDIAFILE_PLAYBACK_ERROR: u32 = 405;

/// Tracking beacon sink, bound to one ad/creative/companion triple when
/// the host constructs it.
///
/// Implementations own all beacon I/O; the coordinator only decides when
/// each signal fires.
pub trait AdTracker {
    fn impression(&mut self);

    /// Progress report; `asset_duration` is NaN while still unknown
    fn progress(&mut self, current_time: f64, asset_duration: f64);

    fn paused(&mut self, paused: bool);

    fn muted(&mut self, muted: bool);

    fn fullscreen(&mut self, fullscreen: bool);

    /// Report a creative click and resolve the click-through destination
    fn click(&mut self) -> Option<String>;

    fn skip(&mut self);

    fn error_with_code(&mut self, code: u32);

    fn complete(&mut self);
}

/// Per-session guard around an [`AdTracker`].
///
/// Owns the session-scoped tracking contract: the asset duration is
/// latched lazily from the player, completion fires at most once, and an
/// earlier error suppresses completion entirely.
pub struct TrackerAdapter {
    sink: Box<dyn AdTracker>,
    asset_duration: Option<f64>,
    errored: bool,
    completed: bool,
}

impl TrackerAdapter {
    /// Wrap a sink; `declared_duration` comes from the ad document when
    /// it carries one.
    pub fn new(sink: Box<dyn AdTracker>, declared_duration: Option<f64>) -> Self {
        TrackerAdapter {
            sink,
            asset_duration: declared_duration.filter(|d| d.is_finite() && *d > 0.0),
            errored: false,
            completed: false,
        }
    }

    pub fn track_impression(&mut self) {
        self.sink.impression();
    }

    /// Report playback progress.
    ///
    /// The first call with a usable player duration fixes the asset
    /// duration for the rest of the session; the duration may be NaN
    /// until the media source has loaded.
    pub fn set_progress(&mut self, current_time: f64, player_duration: f64) {
        if self.asset_duration.is_none() && player_duration.is_finite() && player_duration > 0.0 {
            self.asset_duration = Some(player_duration);
        }
        self.sink
            .progress(current_time, self.asset_duration.unwrap_or(f64::NAN));
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.sink.paused(paused);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.sink.muted(muted);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.sink.fullscreen(fullscreen);
    }

    pub fn click(&mut self) -> Option<String> {
        self.sink.click()
    }

    pub fn skip(&mut self) {
        self.sink.skip();
    }

    pub fn error_with_code(&mut self, code: u32) {
        self.errored = true;
        self.sink.error_with_code(code);
    }

    /// Signal natural completion. Errored or already-completed sessions
    /// make this a no-op.
    pub fn complete(&mut self) {
        if self.errored {
            debug!("completion suppressed: session tracked an error");
            return;
        }
        if self.completed {
            return;
        }
        self.completed = true;
        self.sink.complete();
    }

    pub fn error_occurred(&self) -> bool {
        self.errored
    }
}
