use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use crate::models::users::UserId;

struct Slot {
    issued: AtomicU64,
    serving: watch::Sender<u64>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            issued: AtomicU64::new(0),
            serving: watch::channel(0).0,
        }
    }
}

/// Ticket lock per user id. Tickets are drawn in arrival order by the single
/// task reading the inbound channel, and turns are served in ticket order.
#[derive(Clone, Default)]
pub struct UserSequencer {
    slots: Arc<DashMap<UserId, Arc<Slot>>>,
}

pub struct Ticket {
    slot: Arc<Slot>,
    number: u64,
}

/// Held while the event runs. Dropping it lets the next ticket through.
pub struct Turn {
    slot: Arc<Slot>,
}

impl UserSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self, user_id: UserId) -> Ticket {
        let slot = self
            .slots
            .entry(user_id)
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone();
        let number = slot.issued.fetch_add(1, Ordering::SeqCst);

        Ticket { slot, number }
    }

    /// Forgets users with no ticket in flight.
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Ticket {
    pub async fn wait(self) -> Turn {
        let mut serving = self.slot.serving.subscribe();
        // The sender lives in the slot this ticket holds, so this cannot close.
        let _ = serving.wait_for(|current| *current == self.number).await;

        Turn { slot: self.slot }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.slot.serving.send_modify(|current| *current += 1);
    }
}

/// Plain per-user mutexes, for work that spans more than one user.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every id in ascending order so overlapping sets cannot deadlock.
    pub async fn lock_all(&self, mut users: Vec<UserId>) -> Vec<OwnedMutexGuard<()>> {
        users.sort_unstable();
        users.dedup();

        let mut guards = Vec::with_capacity(users.len());
        for user in users {
            let lock = self.locks.entry(user).or_default().clone();
            guards.push(lock.lock_owned().await);
        }

        guards
    }

    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
