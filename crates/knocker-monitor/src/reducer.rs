//! State reduction: folding events into a [`StateSnapshot`].
//!
//! Events must be applied oldest first; later events overwrite the effects of
//! earlier ones.

use crate::types::{Event, EventKind, ServiceState, StateSnapshot};

/// Returns the snapshot that results from applying `event` to `snapshot`.
#[must_use]
pub fn reduce(snapshot: &StateSnapshot, event: &Event) -> StateSnapshot {
    let mut next = snapshot.clone();
    next.apply(event);
    next
}

/// Replays `events` in order onto an empty snapshot.
#[must_use]
pub fn fold<'a>(events: impl IntoIterator<Item = &'a Event>) -> StateSnapshot {
    events
        .into_iter()
        .fold(StateSnapshot::default(), |snapshot, event| {
            reduce(&snapshot, event)
        })
}

impl StateSnapshot {
    /// Applies one event in place.
    pub fn apply(&mut self, event: &Event) {
        let fields = &event.fields;
        match event.kind {
            EventKind::ServiceState => {
                self.service_state = fields.service_state.unwrap_or(ServiceState::Unknown);
                self.service_version.clone_from(&fields.version);
            }
            EventKind::StatusSnapshot => {
                self.whitelist_ip.clone_from(&fields.whitelist_ip);
                self.expires_at = fields.expires_at;
                self.ttl = fields.ttl;
                self.next_knock_at = fields.next_at;
                self.cadence_source = fields.cadence_source;
            }
            EventKind::WhitelistApplied => {
                self.whitelist_ip.clone_from(&fields.whitelist_ip);
                self.expires_at = fields.expires_at;
                self.ttl = fields.ttl;
            }
            EventKind::WhitelistExpired => {
                self.whitelist_ip = None;
                self.expires_at = None;
                self.ttl = None;
            }
            EventKind::NextKnockUpdated => {
                self.next_knock_at = fields.next_at;
            }
            EventKind::KnockTriggered | EventKind::Error => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CadenceSource, EventFields};
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use std::time::Duration;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    fn applied(ip: &str, expires: i64, ttl: u64) -> Event {
        Event::new(EventKind::WhitelistApplied).with_fields(EventFields {
            whitelist_ip: Some(ip.to_string()),
            expires_at: at(expires),
            ttl: Some(Duration::from_secs(ttl)),
            ..EventFields::default()
        })
    }

    fn status(ip: Option<&str>, next: Option<i64>, cadence: Option<CadenceSource>) -> Event {
        Event::new(EventKind::StatusSnapshot).with_fields(EventFields {
            whitelist_ip: ip.map(str::to_string),
            expires_at: at(1_700_000_600),
            ttl: Some(Duration::from_secs(600)),
            next_at: next.and_then(at),
            cadence_source: cadence,
            ..EventFields::default()
        })
    }

    #[test]
    fn service_state_sets_state_and_version() {
        let event = Event::new(EventKind::ServiceState).with_fields(EventFields {
            service_state: Some(ServiceState::Running),
            version: Some("0.4.2".to_string()),
            ..EventFields::default()
        });
        let snapshot = reduce(&StateSnapshot::default(), &event);
        assert_eq!(snapshot.service_state, ServiceState::Running);
        assert_eq!(snapshot.service_version.as_deref(), Some("0.4.2"));

        let bare = Event::new(EventKind::ServiceState);
        let snapshot = reduce(&snapshot, &bare);
        assert_eq!(snapshot.service_state, ServiceState::Unknown);
        assert_eq!(snapshot.service_version, None);
    }

    #[test]
    fn applied_then_expired_clears_only_whitelist() {
        let start = fold(&[status(None, Some(1_700_000_900), Some(CadenceSource::Ttl))]);
        let applied = reduce(&start, &applied("198.51.100.4", 1_700_000_600, 600));
        assert_eq!(applied.whitelist_ip.as_deref(), Some("198.51.100.4"));

        let expired = reduce(&applied, &Event::new(EventKind::WhitelistExpired));
        assert_eq!(expired.whitelist_ip, None);
        assert_eq!(expired.expires_at, None);
        assert_eq!(expired.ttl, None);
        assert_eq!(expired.next_knock_at, at(1_700_000_900));
        assert_eq!(expired.cadence_source, Some(CadenceSource::Ttl));
    }

    #[test]
    fn status_snapshot_overwrites_all_whitelist_fields() {
        let before = fold(&[
            applied("198.51.100.4", 1_700_000_100, 100),
            Event::new(EventKind::NextKnockUpdated).with_fields(EventFields {
                next_at: at(1_700_000_050),
                ..EventFields::default()
            }),
        ]);

        let after = reduce(&before, &status(Some("192.0.2.1"), None, None));
        assert_eq!(after.whitelist_ip.as_deref(), Some("192.0.2.1"));
        assert_eq!(after.expires_at, at(1_700_000_600));
        assert_eq!(after.ttl, Some(Duration::from_secs(600)));
        assert_eq!(after.next_knock_at, None);
        assert_eq!(after.cadence_source, None);

        let from_empty = reduce(
            &StateSnapshot::default(),
            &status(Some("192.0.2.1"), Some(1_700_000_900), Some(CadenceSource::CheckInterval)),
        );
        assert_eq!(from_empty.next_knock_at, at(1_700_000_900));
        assert_eq!(from_empty.cadence_source, Some(CadenceSource::CheckInterval));
    }

    #[test]
    fn next_knock_updated_touches_only_next_knock() {
        let before = fold(&[status(Some("192.0.2.1"), Some(10), Some(CadenceSource::Ttl))]);
        let event = Event::new(EventKind::NextKnockUpdated).with_fields(EventFields {
            next_at: at(20),
            whitelist_ip: Some("ignored".to_string()),
            ..EventFields::default()
        });
        let after = reduce(&before, &event);
        assert_eq!(after.next_knock_at, at(20));
        assert_eq!(after.whitelist_ip.as_deref(), Some("192.0.2.1"));
        assert_eq!(after.cadence_source, Some(CadenceSource::Ttl));
    }

    #[test]
    fn informational_events_do_not_change_state() {
        let before = fold(&[applied("198.51.100.4", 1_700_000_600, 600)]);
        for kind in [EventKind::KnockTriggered, EventKind::Error] {
            let event = Event::new(kind).with_fields(EventFields {
                whitelist_ip: Some("203.0.113.9".to_string()),
                service_state: Some(ServiceState::Failed),
                ..EventFields::default()
            });
            assert_eq!(reduce(&before, &event), before);
        }
    }

    #[test]
    fn reduce_does_not_mutate_input() {
        let before = StateSnapshot::default();
        let _ = reduce(&before, &applied("198.51.100.4", 1, 1));
        assert_eq!(before, StateSnapshot::default());
    }

    fn arb_event() -> impl Strategy<Value = Event> {
        let kind = prop::sample::select(EventKind::ALL.to_vec());
        let ip = prop::option::of("[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}");
        let instant = prop::option::of(0i64..4_000_000_000);
        let ttl = prop::option::of(0u64..86_400);
        let cadence = prop::option::of(prop::sample::select(vec![
            CadenceSource::Ttl,
            CadenceSource::TtlResponse,
            CadenceSource::CheckInterval,
        ]));
        (kind, ip, instant.clone(), ttl, instant, cadence).prop_map(
            |(kind, ip, expires, ttl, next, cadence)| {
                Event::new(kind).with_fields(EventFields {
                    whitelist_ip: ip,
                    expires_at: expires.and_then(|s| DateTime::from_timestamp(s, 0)),
                    ttl: ttl.map(Duration::from_secs),
                    next_at: next.and_then(|s| DateTime::from_timestamp(s, 0)),
                    cadence_source: cadence,
                    ..EventFields::default()
                })
            },
        )
    }

    proptest! {
        #[test]
        fn fold_is_deterministic(events in prop::collection::vec(arb_event(), 0..40)) {
            let first = fold(&events);
            let second = fold(&events);
            prop_assert_eq!(&first, &second);

            let mut in_place = StateSnapshot::default();
            for event in &events {
                in_place.apply(event);
            }
            prop_assert_eq!(first, in_place);
        }

        #[test]
        fn expiry_always_clears_whitelist(events in prop::collection::vec(arb_event(), 0..20)) {
            let before = fold(&events);
            let after = reduce(&before, &Event::new(EventKind::WhitelistExpired));
            prop_assert!(after.whitelist_ip.is_none());
            prop_assert!(after.expires_at.is_none());
            prop_assert!(after.ttl.is_none());
            prop_assert_eq!(after.next_knock_at, before.next_knock_at);
            prop_assert_eq!(after.cadence_source, before.cadence_source);
        }
    }
}
