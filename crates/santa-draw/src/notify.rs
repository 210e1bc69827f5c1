//! Draw notification hook.
//!
//! Delivery (email, push) belongs to the notification service; the draw
//! engine only hands it one event per participant after a commit.
use santa_types::events::DrawEvent;
use tracing::info;

pub trait DrawNotifier: Send + Sync {
    fn notify(&self, event: &DrawEvent);
}

/// Discards all events.
pub struct NullNotifier;

impl DrawNotifier for NullNotifier {
    #[inline]
    fn notify(&self, _event: &DrawEvent) {}
}

/// Writes events to the tracing subscriber.
pub struct TracingNotifier;

impl DrawNotifier for TracingNotifier {
    fn notify(&self, event: &DrawEvent) {
        match event {
            DrawEvent::DrawCompleted { group_id, user_id } => {
                info!(target: "santa::notify", group_id, user_id, "Draw completed");
            }
        }
    }
}
