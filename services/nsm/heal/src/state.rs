//! Heal bookkeeping owned by the serialized executor worker.

use nsm_api::{Connection, ConnectionEvent, ConnectionEventType};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stored replay action; invoking it only dispatches work, it never blocks
pub(crate) type Action = Arc<dyn Fn() + Send + Sync>;

/// Where a registered connection stands against the reported state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedState {
    /// Registered and present in the reported state
    Active,
    /// Registered but missing from the reported state; repairs are in flight
    Healing,
}

impl fmt::Display for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedState::Active => write!(f, "active"),
            TrackedState::Healing => write!(f, "healing"),
        }
    }
}

/// Reported connections plus the requestor and closer of every tracked id
#[derive(Default)]
pub(crate) struct HealState {
    reported: HashMap<String, Connection>,
    requestors: HashMap<String, Action>,
    closers: HashMap<String, Action>,
}

fn event_id(key: String, conn: &Connection) -> String {
    if conn.id.is_empty() {
        key
    } else {
        conn.id.clone()
    }
}

impl HealState {
    /// Track `id`, replacing the actions of an earlier registration
    pub(crate) fn register(&mut self, id: String, requestor: Action, closer: Action) {
        self.requestors.insert(id.clone(), requestor);
        self.closers.insert(id, closer);
    }

    /// Stop tracking `id`; true if it was tracked
    pub(crate) fn unregister(&mut self, id: &str) -> bool {
        let had_requestor = self.requestors.remove(id).is_some();
        let had_closer = self.closers.remove(id).is_some();
        had_requestor || had_closer
    }

    /// Fold `event` into the reported state and return the tracked ids to repair
    pub(crate) fn apply(&mut self, event: ConnectionEvent) -> BTreeSet<String> {
        let mut to_heal = BTreeSet::new();
        let kind = match ConnectionEventType::try_from(event.r#type) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(
                    "Ignoring monitor event of unknown type {} with {} connections",
                    event.r#type,
                    event.connections.len()
                );
                return to_heal;
            }
        };
        match kind {
            ConnectionEventType::InitialStateTransfer => {
                self.reported = event
                    .connections
                    .into_iter()
                    .map(|(key, conn)| (event_id(key, &conn), conn))
                    .collect();
            }
            ConnectionEventType::Update => {
                for (key, conn) in event.connections {
                    self.reported.insert(event_id(key, &conn), conn);
                }
            }
            ConnectionEventType::Delete => {
                for (key, conn) in event.connections {
                    let id = event_id(key, &conn);
                    self.reported.remove(&id);
                    if self.requestors.contains_key(&id) {
                        to_heal.insert(id);
                    }
                }
            }
        }
        for id in self.requestors.keys() {
            if !self.reported.contains_key(id) {
                to_heal.insert(id.clone());
            }
        }
        to_heal
    }

    /// Invoke the requestor of each id, once per id
    pub(crate) fn heal(&self, ids: &BTreeSet<String>) -> usize {
        let mut invoked = 0;
        for id in ids {
            if let Some(requestor) = self.requestors.get(id) {
                debug!("Connection {} missing from monitor state, healing", id);
                requestor();
                invoked += 1;
            }
        }
        invoked
    }

    /// Apply `event`, then heal whatever it left missing
    pub(crate) fn apply_and_heal(&mut self, event: ConnectionEvent) -> usize {
        let to_heal = self.apply(event);
        self.heal(&to_heal)
    }

    pub(crate) fn tracked_state(&self, id: &str) -> Option<TrackedState> {
        if !self.requestors.contains_key(id) {
            return None;
        }
        if self.reported.contains_key(id) {
            Some(TrackedState::Active)
        } else {
            Some(TrackedState::Healing)
        }
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.requestors.len()
    }

    pub(crate) fn reported(&self, id: &str) -> Option<Connection> {
        self.reported.get(id).cloned()
    }

    pub(crate) fn reported_count(&self) -> usize {
        self.reported.len()
    }

    /// Forget everything and hand back the closers of the tracked ids
    pub(crate) fn clear(&mut self) -> Vec<Action> {
        self.requestors.clear();
        self.reported.clear();
        self.closers.drain().map(|(_, closer)| closer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_action(counter: &Arc<AtomicUsize>) -> Action {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn noop() -> Action {
        Arc::new(|| {})
    }

    fn conn(id: &str, service: &str) -> Connection {
        Connection::new(id).with_network_service(service)
    }

    fn ids(state: &HealState) -> Vec<String> {
        let mut ids: Vec<_> = state.reported.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_event_fold_matches_replace_upsert_remove() {
        let events = vec![
            ConnectionEvent::update(vec![conn("stale", "old")]),
            ConnectionEvent::initial_state_transfer(vec![conn("a", "s1"), conn("b", "s1")]),
            ConnectionEvent::update(vec![conn("b", "s2"), conn("c", "s1")]),
            ConnectionEvent::delete(vec![conn("a", "")]),
            ConnectionEvent::delete(vec![conn("missing", "")]),
        ];

        let mut state = HealState::default();
        for event in events.clone() {
            state.apply(event);
        }
        assert_eq!(ids(&state), vec!["b", "c"]);
        assert_eq!(state.reported("b").unwrap().network_service, "s2");

        let mut replayed = HealState::default();
        for event in events.clone().into_iter().chain(events) {
            replayed.apply(event);
        }
        assert_eq!(ids(&replayed), ids(&state));
        assert_eq!(replayed.reported("b"), state.reported("b"));
    }

    #[test]
    fn test_delete_heals_tracked_id_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = HealState::default();
        state.apply(ConnectionEvent::initial_state_transfer(vec![conn("x", "s")]));
        state.register("x".to_string(), counting_action(&counter), noop());
        assert_eq!(state.tracked_state("x"), Some(TrackedState::Active));

        let healed = state.apply_and_heal(ConnectionEvent::delete(vec![conn("x", "s")]));
        assert_eq!(healed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(state.tracked_state("x"), Some(TrackedState::Healing));
    }

    #[test]
    fn test_sweep_heals_ids_absent_after_update() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = HealState::default();
        state.apply(ConnectionEvent::initial_state_transfer(vec![conn("a", "s")]));
        state.register("a".to_string(), noop(), noop());
        state.register("y".to_string(), counting_action(&counter), noop());

        let healed = state.apply_and_heal(ConnectionEvent::update(vec![conn("a", "s2")]));
        assert_eq!(healed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        state.apply_and_heal(ConnectionEvent::update(vec![conn("y", "s")]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(state.tracked_state("y"), Some(TrackedState::Active));
    }

    #[test]
    fn test_unknown_event_type_leaves_state_untouched() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = HealState::default();
        state.apply(ConnectionEvent::initial_state_transfer(vec![
            conn("x", "s"),
            conn("y", "s"),
        ]));
        state.register("x".to_string(), counting_action(&counter), noop());

        let mut event = ConnectionEvent::update(vec![conn("z", "s")]);
        event.r#type = 7;
        let healed = state.apply_and_heal(event);

        assert_eq!(healed, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(ids(&state), vec!["x", "y"]);
        assert_eq!(state.tracked_state("x"), Some(TrackedState::Active));
    }

    #[test]
    fn test_unregistered_id_is_not_healed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = HealState::default();
        state.register("x".to_string(), counting_action(&counter), noop());
        assert!(state.unregister("x"));
        assert!(!state.unregister("x"));

        state.apply_and_heal(ConnectionEvent::delete(vec![conn("x", "s")]));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(state.tracked_state("x"), None);
    }

    #[test]
    fn test_clear_returns_closers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = HealState::default();
        state.register("a".to_string(), noop(), counting_action(&counter));
        state.register("b".to_string(), noop(), counting_action(&counter));

        for closer in state.clear() {
            closer();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(state.tracked_count(), 0);
        assert_eq!(state.reported_count(), 0);
    }
}
