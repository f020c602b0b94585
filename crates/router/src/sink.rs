//! Seam between the router and the delivery mechanism.

use uuid::Uuid;

use gatewatch_core::Alert;

/// Accepts alerts the router has decided to queue. Implemented by the
/// webhook dispatcher; kept as a trait here so this crate never depends on
/// `reqwest` or any concrete delivery transport.
pub trait AlertSink: Send + Sync {
    /// Enqueue a newly created alert for delivery.
    fn enqueue(&self, alert: Alert);

    /// Replace the payload of an alert still sitting in the dispatcher's
    /// queue (not yet sent), used to upgrade a pending `gatecamp_detected`
    /// alert in place rather than emit a second one for the same window.
    /// Returns `true` if the alert was found and updated.
    fn try_update_payload(&self, alert_id: Uuid, payload: serde_json::Value) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::AlertSink;
    use gatewatch_core::Alert;

    /// Records every alert handed to it; used by router tests in place of
    /// a real webhook dispatcher.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub alerts: Mutex<Vec<Alert>>,
    }

    impl AlertSink for RecordingSink {
        fn enqueue(&self, alert: Alert) {
            self.alerts.lock().expect("recording sink mutex poisoned").push(alert);
        }

        fn try_update_payload(&self, alert_id: uuid::Uuid, payload: serde_json::Value) -> bool {
            let mut alerts = self.alerts.lock().expect("recording sink mutex poisoned");
            if let Some(alert) = alerts.iter_mut().find(|a| a.alert_id == alert_id) {
                alert.payload = payload;
                true
            } else {
                false
            }
        }
    }
}
