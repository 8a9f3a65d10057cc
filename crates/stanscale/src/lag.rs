//! Lag and activation computed from a single channel snapshot.
//!
//! All functions here are pure over their inputs; the caller threads the
//! snapshot it fetched straight in.

use tracing::info;

use crate::snapshot::ChannelSnapshot;

/// The durable queue subscription whose backlog drives scaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    durable_name: String,
    queue_group: String,
    combined: String,
}

impl TargetIdentity {
    pub fn new(durable_name: impl Into<String>, queue_group: impl Into<String>) -> Self {
        let durable_name = durable_name.into();
        let queue_group = queue_group.into();
        let combined = format!("{durable_name}:{queue_group}");
        Self {
            durable_name,
            queue_group,
            combined,
        }
    }

    pub fn durable_name(&self) -> &str {
        &self.durable_name
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }

    /// `durable:group`, as the broker reports it in `queue_name`.
    pub fn combined_queue_name(&self) -> &str {
        &self.combined
    }

    /// Exact, case-sensitive match against a reported queue name.
    pub fn matches(&self, queue_name: &str) -> bool {
        queue_name == self.combined
    }
}

/// Backlog of the target group: `last_seq` minus the furthest `last_sent`
/// among its subscribers.
///
/// Several subscribers in one group take the most advanced position. With
/// no matching subscriber the whole channel counts as backlog. Out-of-range
/// sequence numbers saturate instead of overflowing.
pub fn max_msg_lag(snapshot: &ChannelSnapshot, target: &TargetIdentity) -> i64 {
    let max_last_sent = snapshot
        .subscribers
        .iter()
        .filter(|sub| target.matches(&sub.queue_name))
        .map(|sub| sub.last_sent)
        .fold(0, i64::max);

    snapshot.last_sequence.saturating_sub(max_last_sent)
}

/// Whether the first subscriber of the target group has unacknowledged
/// messages in flight.
pub fn has_pending_message(snapshot: &ChannelSnapshot, target: &TargetIdentity) -> bool {
    match snapshot
        .subscribers
        .iter()
        .find(|sub| target.matches(&sub.queue_name))
    {
        Some(sub) => sub.pending_count > 0,
        None => {
            info!(
                combined_queue_name = %target.combined_queue_name(),
                channel = %snapshot.name,
                "STAN subscription not found"
            );
            false
        }
    }
}

/// Activation decision: pending work, or lag above the activation threshold.
pub fn is_active(
    snapshot: &ChannelSnapshot,
    target: &TargetIdentity,
    activation_lag_threshold: i64,
) -> bool {
    has_pending_message(snapshot, target)
        || max_msg_lag(snapshot, target) > activation_lag_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SubscriberSnapshot;

    fn subscriber(queue_name: &str, last_sent: i64, pending: i64) -> SubscriberSnapshot {
        SubscriberSnapshot {
            client_id: format!("client-{last_sent}"),
            queue_name: queue_name.to_string(),
            is_durable: true,
            last_sent,
            pending_count: pending,
            ..SubscriberSnapshot::default()
        }
    }

    fn snapshot(last_sequence: i64, subscribers: Vec<SubscriberSnapshot>) -> ChannelSnapshot {
        ChannelSnapshot {
            name: "orders".to_string(),
            msg_count: last_sequence,
            last_sequence,
            subscribers,
        }
    }

    fn target() -> TargetIdentity {
        TargetIdentity::new("d", "g")
    }

    #[test]
    fn combined_queue_name() {
        assert_eq!(target().combined_queue_name(), "d:g");
    }

    #[test]
    fn matching_is_exact() {
        let t = target();
        assert!(t.matches("d:g"));
        assert!(!t.matches("D:g"));
        assert!(!t.matches("d:g2"));
        assert!(!t.matches("d:"));
        assert!(!t.matches(""));
    }

    #[test]
    fn lag_from_single_subscriber() {
        let snap = snapshot(100, vec![subscriber("d:g", 90, 0)]);
        assert_eq!(max_msg_lag(&snap, &target()), 10);
    }

    #[test]
    fn lag_without_matching_subscriber_is_full_backlog() {
        let snap = snapshot(50, vec![subscriber("other:g", 45, 0)]);
        assert_eq!(max_msg_lag(&snap, &target()), 50);

        let empty = snapshot(50, vec![]);
        assert_eq!(max_msg_lag(&empty, &target()), 50);
    }

    #[test]
    fn lag_saturates_on_out_of_range_sequence() {
        let snap = snapshot(i64::MIN, vec![subscriber("d:g", 1, 0)]);
        assert_eq!(max_msg_lag(&snap, &target()), i64::MIN);
    }

    #[test]
    fn lag_uses_most_advanced_subscriber() {
        let snap = snapshot(
            100,
            vec![subscriber("d:g", 80, 0), subscriber("d:g", 95, 0)],
        );
        assert_eq!(max_msg_lag(&snap, &target()), 5);
    }

    #[test]
    fn lag_ignores_other_groups_even_if_further_ahead() {
        let snap = snapshot(
            100,
            vec![subscriber("d:g", 70, 0), subscriber("d:other", 99, 0)],
        );
        assert_eq!(max_msg_lag(&snap, &target()), 30);
    }

    #[test]
    fn pending_on_first_match() {
        let snap = snapshot(10, vec![subscriber("d:g", 10, 3)]);
        assert!(has_pending_message(&snap, &target()));
    }

    #[test]
    fn pending_only_checks_first_match() {
        let snap = snapshot(
            10,
            vec![subscriber("d:g", 10, 0), subscriber("d:g", 9, 5)],
        );
        assert!(!has_pending_message(&snap, &target()));
    }

    #[test]
    fn no_pending_when_subscription_missing() {
        let snap = snapshot(10, vec![subscriber("x:y", 0, 7)]);
        assert!(!has_pending_message(&snap, &target()));
    }

    #[test]
    fn pending_dominates_activation_threshold() {
        // Lag 2 is below the threshold of 5, but messages are in flight.
        let snap = snapshot(100, vec![subscriber("d:g", 98, 3)]);
        assert!(is_active(&snap, &target(), 5));
    }

    #[test]
    fn lag_above_threshold_activates() {
        let snap = snapshot(100, vec![subscriber("d:g", 90, 0)]);
        assert!(is_active(&snap, &target(), 5));
    }

    #[test]
    fn lag_at_threshold_does_not_activate() {
        let snap = snapshot(100, vec![subscriber("d:g", 95, 0)]);
        assert!(!is_active(&snap, &target(), 5));
    }

    #[test]
    fn caught_up_group_is_inactive_with_default_threshold() {
        let snap = snapshot(100, vec![subscriber("d:g", 100, 0)]);
        assert!(!is_active(&snap, &target(), 0));
    }

    #[test]
    fn cold_start_with_backlog_is_active() {
        let snap = snapshot(12, vec![]);
        assert!(is_active(&snap, &target(), 0));
    }
}
