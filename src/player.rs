use crate::models::{CompanionMarkup, MediaSource};

/// Identifies one overlay installed on the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// The overlay widgets an ad session installs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Click-catching layer covering the playback surface
    Blocker,
    /// Skip countdown button
    SkipButton,
}

/// Host insertion point for an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySlot {
    /// Directly before the control bar
    BeforeControlBar,
    /// End of the player root element
    PlayerRoot,
}

/// Capability handle onto the host media player.
///
/// One handle is shared across the coordinator's event listeners, so
/// implementations use interior mutability and every method takes
/// `&self`. Overlay widgets are opaque: the host renders them and
/// forwards their clicks back over the event bus.
pub trait PlayerSurface {
    /// Duration of the active source in seconds; NaN until known
    fn duration(&self) -> f64;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Replace the active source with the given alternatives, in
    /// preference order
    fn switch_source(&self, sources: &[MediaSource]);

    fn controls_enabled(&self) -> bool;

    fn set_controls_enabled(&self, enabled: bool);

    fn seek_enabled(&self) -> bool;

    fn set_seek_enabled(&self, enabled: bool);

    fn is_fullscreen(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn volume(&self) -> f64;

    /// Resume playback
    fn play(&self);

    /// Clear any surfaced playback error
    fn clear_error(&self);

    /// Hide the loading spinner while ad frames render
    fn hide_spinner(&self);

    /// Open a click-through destination in a new browsing context
    fn open_url(&self, url: &str);

    /// Render companion markup into the host element with this ID
    fn mount_companion(&self, element_id: &str, markup: &CompanionMarkup);

    fn install_overlay(&self, kind: OverlayKind, slot: OverlaySlot) -> OverlayId;

    fn set_overlay_visible(&self, id: OverlayId, visible: bool);

    fn set_overlay_label(&self, id: OverlayId, label: &str);

    fn set_overlay_interactive(&self, id: OverlayId, interactive: bool);

    fn remove_overlay(&self, id: OverlayId);
}
