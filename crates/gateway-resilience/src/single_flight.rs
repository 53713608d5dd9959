//! Single-flight de-duplication: at most one builder per cache key runs at
//! a time, other callers for the same key await its result instead of
//! duplicating the upstream call.
//!
//! The first caller to register for a key becomes the leader and is
//! responsible for calling [`SingleFlightGroup::resolve`] or
//! [`SingleFlightGroup::abandon`]. Every subsequent caller for the same key
//! is a waiter and receives the leader's result via
//! [`SingleFlightGroup::join`]. If the leader abandons without resolving,
//! the first waiter still queued is actually promoted to leader -- `join`
//! resolves with [`JoinOutcome::Promoted`] for that waiter, who must then
//! build the value itself and call `resolve`/`resolve_err`/`abandon` in
//! turn, the same contract the original leader had. Only when no waiter
//! remains queued does the key collapse and clear.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Outcome of awaiting another caller's in-flight build for the same key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SingleFlightError {
    /// The leader resolved the key with an error that waiters also observe.
    #[error("leader's build failed: {0}")]
    LeaderFailed(String),
    /// The leader (and every promoted successor) was dropped without ever
    /// resolving the key; no result exists to hand to waiters.
    #[error("single-flight build abandoned with no result")]
    Abandoned,
}

/// What a waiter's [`SingleFlightGroup::join`] call resolved with.
pub enum JoinOutcome<V> {
    /// The leader (or a promoted successor) finished the build.
    Resolved(Result<V, SingleFlightError>),
    /// This waiter was promoted to leader after the prior leader abandoned
    /// the build; it must build the value itself and call
    /// `resolve`/`resolve_err`/`abandon`.
    Promoted,
}

enum Slot<V> {
    Pending {
        notify: Arc<Notify>,
        waiters: VecDeque<oneshot::Sender<()>>,
    },
    Done(Result<V, String>),
}

/// Whether the caller that just joined a key is responsible for building
/// the value (`Leader`) or should await the leader's result (`Waiter`).
pub enum Role<V> {
    /// This caller must build the value and call `resolve`/`abandon`.
    Leader,
    /// Another caller is building; await its outcome via
    /// [`SingleFlightGroup::join`].
    Waiter(Waiting<V>),
}

/// A waiter's handle on a pending build: the notification it wakes on when
/// the build finishes, and the promotion channel it wakes on if the leader
/// abandons and hands leadership to it instead.
pub struct Waiting<V> {
    notify: Arc<Notify>,
    promoted: oneshot::Receiver<()>,
    _marker: PhantomMarker<V>,
}

/// Zero-sized marker carrying `V` so `Role<V>`/`Waiting<V>` can be generic
/// without storing a value in the waiter arm.
pub struct PhantomMarker<V>(std::marker::PhantomData<V>);

/// A group of in-flight, de-duplicated builds keyed by `K`.
pub struct SingleFlightGroup<K, V> {
    inflight: DashMap<K, Slot<V>>,
}

impl<K, V> Default for SingleFlightGroup<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlightGroup<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Register interest in `key`. Returns `Leader` for the first caller;
    /// every later caller for the same still-pending key gets `Waiter` and
    /// must call [`SingleFlightGroup::join`] to get the result.
    pub fn enter(&self, key: K) -> Role<V> {
        match self.inflight.entry(key) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Slot::Pending {
                    notify: Arc::new(Notify::new()),
                    waiters: VecDeque::new(),
                });
                Role::Leader
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => match slot.get_mut() {
                Slot::Pending { notify, waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    Role::Waiter(Waiting {
                        notify: Arc::clone(notify),
                        promoted: rx,
                        _marker: PhantomMarker(std::marker::PhantomData),
                    })
                }
                Slot::Done(_) => {
                    // A previous build already landed and hasn't been
                    // cleared; treat this caller as a fresh leader so it
                    // rebuilds (entries are cleared by `resolve`/`abandon`
                    // immediately after notifying, so this is rare).
                    slot.insert(Slot::Pending {
                        notify: Arc::new(Notify::new()),
                        waiters: VecDeque::new(),
                    });
                    Role::Leader
                }
            },
        }
    }

    /// As a waiter, block until the leader resolves, abandons with no
    /// remaining waiter, or promotes this caller to leader.
    pub async fn join(&self, key: &K, mut waiting: Waiting<V>) -> JoinOutcome<V> {
        loop {
            tokio::select! {
                _ = waiting.notify.notified() => {
                    return JoinOutcome::Resolved(self.resolved_result(key));
                }
                res = &mut waiting.promoted => {
                    match res {
                        Ok(()) => return JoinOutcome::Promoted,
                        // Sender dropped without promoting this waiter
                        // (e.g. the group is being torn down); keep
                        // waiting on the shared notify instead.
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    fn resolved_result(&self, key: &K) -> Result<V, SingleFlightError> {
        match self.inflight.get(key).map(|slot| match slot.value() {
            Slot::Done(result) => Some(result.clone()),
            Slot::Pending { .. } => None,
        }) {
            Some(Some(Ok(value))) => Ok(value),
            Some(Some(Err(message))) => Err(SingleFlightError::LeaderFailed(message)),
            _ => Err(SingleFlightError::Abandoned),
        }
    }

    /// As the leader, publish a successful result and wake all waiters.
    pub fn resolve(&self, key: K, value: V) {
        self.finish(key, Ok(value));
    }

    /// As the leader, publish a failure and wake all waiters with it.
    pub fn resolve_err(&self, key: K, message: impl Into<String>) {
        self.finish(key, Err(message.into()));
    }

    fn finish(&self, key: K, result: Result<V, String>) {
        if let Some((_, Slot::Pending { notify, .. })) = self.inflight.remove(&key) {
            self.inflight.insert(key, Slot::Done(result));
            notify.notify_waiters();
        }
    }

    /// As the leader, abandon the build without a result (e.g. the leader
    /// itself was cancelled). The first still-queued waiter, if any, is
    /// promoted to leader via its promotion channel and must build the
    /// value itself; the shared `notify` and remaining waiter queue are
    /// left untouched so a later `resolve`/`resolve_err`/`abandon` from
    /// the promoted leader reaches everyone still waiting. If no waiter
    /// remains, the key is cleared so the next caller becomes a fresh
    /// leader.
    pub fn abandon(&self, key: K) {
        let promoted = self.inflight.get_mut(&key).and_then(|mut slot| {
            if let Slot::Pending { waiters, .. } = slot.value_mut() {
                waiters.pop_front()
            } else {
                None
            }
        });

        match promoted {
            Some(promote_tx) => {
                let _ = promote_tx.send(());
            }
            None => {
                self.inflight.remove(&key);
            }
        }
    }

    /// Number of keys currently tracked (pending or freshly resolved).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_leader_builds_once() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k1".to_string();

        let leader_role = group.enter(key.clone());
        assert!(matches!(leader_role, Role::Leader));

        // A second caller for the same key joins as a waiter.
        let waiter_role = group.enter(key.clone());
        let waiting = match waiter_role {
            Role::Waiter(waiting) => waiting,
            Role::Leader => panic!("expected waiter"),
        };

        let group_for_waiter = Arc::clone(&group);
        let key_for_waiter = key.clone();
        let waiter_task =
            tokio::spawn(async move { group_for_waiter.join(&key_for_waiter, waiting).await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        group.resolve(key, 42);

        let result = waiter_task.await.expect("join");
        match result {
            JoinOutcome::Resolved(Ok(value)) => assert_eq!(value, 42),
            _ => panic!("expected resolved value"),
        }
    }

    #[tokio::test]
    async fn test_leader_failure_propagates_to_waiters() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k2".to_string();

        let _leader = group.enter(key.clone());
        let waiting = match group.enter(key.clone()) {
            Role::Waiter(waiting) => waiting,
            Role::Leader => panic!("expected waiter"),
        };

        group.resolve_err(key.clone(), "upstream exploded");
        let result = group.join(&key, waiting).await;
        assert!(matches!(
            result,
            JoinOutcome::Resolved(Err(SingleFlightError::LeaderFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_abandon_with_no_waiters_clears_key() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k3".to_string();
        let _leader = group.enter(key.clone());
        group.abandon(key);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_abandon_promotes_next_waiter() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k4".to_string();
        let _leader = group.enter(key.clone());
        let waiting = match group.enter(key.clone()) {
            Role::Waiter(waiting) => waiting,
            Role::Leader => panic!("expected waiter"),
        };

        group.abandon(key.clone());
        let result = group.join(&key, waiting).await;
        assert!(matches!(result, JoinOutcome::Promoted));
        // The key is still tracked, now pending, for the promoted waiter
        // to build and eventually resolve.
        assert!(!group.is_empty());
    }

    #[tokio::test]
    async fn test_promoted_waiter_can_resolve_for_remaining_waiters() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k5".to_string();

        let _leader = group.enter(key.clone());
        let promoted_waiting = match group.enter(key.clone()) {
            Role::Waiter(waiting) => waiting,
            Role::Leader => panic!("expected waiter"),
        };
        let trailing_waiting = match group.enter(key.clone()) {
            Role::Waiter(waiting) => waiting,
            Role::Leader => panic!("expected waiter"),
        };

        // Original leader abandons; the first waiter is promoted.
        group.abandon(key.clone());
        let promoted_outcome = group.join(&key, promoted_waiting).await;
        assert!(matches!(promoted_outcome, JoinOutcome::Promoted));

        // The promoted waiter now builds the value and resolves as leader.
        let group_for_trailing = Arc::clone(&group);
        let key_for_trailing = key.clone();
        let trailing_task = tokio::spawn(async move {
            group_for_trailing.join(&key_for_trailing, trailing_waiting).await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        group.resolve(key, 7);

        let trailing_outcome = trailing_task.await.expect("join");
        match trailing_outcome {
            JoinOutcome::Resolved(Ok(value)) => assert_eq!(value, 7),
            _ => panic!("expected the promoted leader's result"),
        }
    }

    #[tokio::test]
    async fn test_abandon_with_no_waiters_allows_fresh_leader() {
        let group: Arc<SingleFlightGroup<String, u32>> = Arc::new(SingleFlightGroup::new());
        let key = "k6".to_string();
        let _leader = group.enter(key.clone());
        group.abandon(key.clone());
        assert!(matches!(group.enter(key), Role::Leader));
    }
}
