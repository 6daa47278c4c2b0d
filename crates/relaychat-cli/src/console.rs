//! Terminal rendering of session events.

use std::time::{SystemTime, UNIX_EPOCH};

use relaychat_session::{EventReceiver, SessionEvent};

/// Printed once the greeting has been written.
pub(crate) const GREETING_SENT: &str = "Initial message sent";

/// Channel used when none is given: current Unix time in milliseconds.
pub(crate) fn default_channel_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// One console line for an event.
pub(crate) fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Connected(channel) => format!("Connected to channel {channel}"),
        SessionEvent::Message(text) => format!("Received message: {text}"),
        SessionEvent::Disconnected(reason) => format!("Disconnected: {reason}"),
        SessionEvent::Error(error) => format!("Error: {error}"),
    }
}

/// Print events until the session's terminal event.
pub(crate) async fn print_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        let line = render(&event);
        if matches!(event, SessionEvent::Error(_)) {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}
