//! Desired monitoring state, replayed after every successful authentication.

use crate::message::ClientFrame;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Default)]
struct Desired {
    monitoring: bool,
    nodes: BTreeSet<String>,
}

/// Node subscriptions and the monitoring flag, as the caller asked for them.
///
/// The server forgets both when the socket drops, so the driver re-sends
/// `restore_frames()` after each `auth_success`.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    desired: RwLock<Desired>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the node was not tracked yet.
    pub fn add_node(&self, reference_code: &str) -> bool {
        let added = self.desired.write().nodes.insert(reference_code.to_string());
        if added {
            debug!(reference_code, "Tracking node subscription");
        }
        added
    }

    /// Returns `true` if the node was tracked.
    pub fn remove_node(&self, reference_code: &str) -> bool {
        self.desired.write().nodes.remove(reference_code)
    }

    pub fn contains_node(&self, reference_code: &str) -> bool {
        self.desired.read().nodes.contains(reference_code)
    }

    pub fn nodes(&self) -> Vec<String> {
        self.desired.read().nodes.iter().cloned().collect()
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.desired.write().monitoring = enabled;
    }

    pub fn monitoring_desired(&self) -> bool {
        self.desired.read().monitoring
    }

    /// Frames that rebuild the server-side state on a fresh session.
    pub fn restore_frames(&self) -> Vec<ClientFrame> {
        let desired = self.desired.read();
        let mut frames: Vec<ClientFrame> = desired
            .nodes
            .iter()
            .map(|reference_code| ClientFrame::SubscribeNode {
                reference_code: reference_code.clone(),
            })
            .collect();
        if desired.monitoring {
            frames.push(ClientFrame::StartMonitoring);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove_nodes() {
        let subs = SubscriptionManager::new();
        assert!(subs.add_node("AERO-2"));
        assert!(subs.add_node("AERO-1"));
        assert!(!subs.add_node("AERO-1"));
        assert_eq!(subs.nodes(), vec!["AERO-1", "AERO-2"]);

        assert!(subs.remove_node("AERO-2"));
        assert!(!subs.remove_node("AERO-2"));
        assert!(!subs.contains_node("AERO-2"));
    }

    #[test]
    fn test_restore_frames_order() {
        let subs = SubscriptionManager::new();
        assert!(subs.restore_frames().is_empty());

        subs.add_node("AERO-1");
        subs.set_monitoring(true);
        assert_eq!(
            subs.restore_frames(),
            vec![
                ClientFrame::SubscribeNode {
                    reference_code: "AERO-1".into()
                },
                ClientFrame::StartMonitoring,
            ]
        );

        subs.set_monitoring(false);
        assert_eq!(subs.restore_frames().len(), 1);
    }
}
