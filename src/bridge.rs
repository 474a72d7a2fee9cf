use crate::events::{EventBus, PlayerEvent};
use crate::player::PlayerSurface;
use crate::session::AdSession;
use crate::tracker::MEDIAFILE_PLAYBACK_ERROR;
use std::rc::Rc;

/// Wire the host player's ad playback events to the session's tracker.
///
/// Every handle registered here joins the session's owned listener set;
/// teardown removes the whole set in one pass. The completion latch is
/// the exception: it is a one-shot on the done signal itself and retires
/// when that signal fires.
pub(crate) fn install(bus: &Rc<EventBus>, player: &Rc<dyn PlayerSurface>, session: &Rc<AdSession>) {
    let mut handles = Vec::new();

    // Impression once the ad source can play
    {
        let session = session.clone();
        handles.push(bus.on(PlayerEvent::AdCanPlay, move || {
            session.tracker.borrow_mut().track_impression();
        }));
    }

    // Progress, with the asset duration latched lazily from the player
    {
        let session = session.clone();
        let player = player.clone();
        handles.push(bus.on(PlayerEvent::AdTimeUpdate, move || {
            session
                .tracker
                .borrow_mut()
                .set_progress(player.current_time(), player.duration());
        }));
    }

    // Pause, arming the matching resume report one-shot
    {
        let session = session.clone();
        let weak_bus = Rc::downgrade(bus);
        handles.push(bus.on(PlayerEvent::AdPause, move || {
            session.tracker.borrow_mut().set_paused(true);
            let Some(bus) = weak_bus.upgrade() else {
                return;
            };
            let resume_session = session.clone();
            let resume = bus.once(PlayerEvent::AdPlay, move || {
                resume_session.tracker.borrow_mut().set_paused(false);
            });
            session.listeners.borrow_mut().push(resume);
        }));
    }

    // A media error is tracked, hidden from the viewer, and ends the ad
    {
        let session = session.clone();
        let player = player.clone();
        let weak_bus = Rc::downgrade(bus);
        handles.push(bus.on(PlayerEvent::AdError, move || {
            session
                .tracker
                .borrow_mut()
                .error_with_code(MEDIAFILE_PLAYBACK_ERROR);
            session.error_occurred.set(true);
            player.clear_error();
            if let Some(bus) = weak_bus.upgrade() {
                bus.trigger(PlayerEvent::AdEnded);
            }
        }));
    }

    // Covers both entering and leaving fullscreen
    {
        let session = session.clone();
        let player = player.clone();
        handles.push(bus.on(PlayerEvent::FullscreenChange, move || {
            session
                .tracker
                .borrow_mut()
                .set_fullscreen(player.is_fullscreen());
        }));
    }

    // Edge-triggered mute detection against the session's shadow state
    {
        let session = session.clone();
        let player = player.clone();
        handles.push(bus.on(PlayerEvent::AdVolumeChange, move || {
            handle_volume_change(player.as_ref(), &session);
        }));
    }

    // Completion latch: fires after teardown has restored the player
    {
        let session = session.clone();
        bus.once(PlayerEvent::SessionDone, move || {
            if !session.error_occurred.get() {
                session.tracker.borrow_mut().complete();
            }
        });
    }

    session.listeners.borrow_mut().extend(handles);
}

/// Report a mute transition, if this volume change is one.
///
/// A change in the mute flag wins. Otherwise only crossings of zero
/// volume count: >0 to 0 is a mute, 0 to >0 an unmute. Magnitude
/// changes on the same side of zero report nothing.
fn handle_volume_change(player: &dyn PlayerSurface, session: &AdSession) {
    let muted_now = player.is_muted();
    let volume_now = player.volume();
    let previous_muted = session.previous_muted.get();
    let previous_volume = session.previous_volume.get();

    if previous_muted != muted_now {
        session.tracker.borrow_mut().set_muted(muted_now);
        session.previous_muted.set(muted_now);
    } else if previous_volume != volume_now {
        if previous_volume > 0.0 && volume_now == 0.0 {
            session.tracker.borrow_mut().set_muted(true);
        } else if previous_volume == 0.0 && volume_now > 0.0 {
            session.tracker.borrow_mut().set_muted(false);
        }
        session.previous_volume.set(volume_now);
    }
}
