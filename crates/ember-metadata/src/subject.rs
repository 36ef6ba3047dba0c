//! Observer notification with coalescing locks

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Receives change notifications from metadata items
pub trait Observer: Send + Sync {
    /// Called after the item identified by `subject` changed
    fn update(&self, subject: Uuid);
}

#[derive(Default)]
struct SubjectState {
    observers: Vec<Weak<dyn Observer>>,
    locks: usize,
    pending: bool,
}

/// Notification source owned by every metadata item.
///
/// Observers are held weakly; an observer that has been dropped is pruned on
/// the next notification. While the subject is locked, notifications are
/// recorded and delivered once when the outermost lock is released.
pub struct Subject {
    id: Uuid,
    state: Mutex<SubjectState>,
}

impl Subject {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: Mutex::new(SubjectState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn attach(&self, observer: &Arc<dyn Observer>) {
        let mut state = self.state.lock();
        let weak = Arc::downgrade(observer);
        if !state.observers.iter().any(|o| o.ptr_eq(&weak)) {
            state.observers.push(weak);
        }
    }

    pub fn detach(&self, observer: &Arc<dyn Observer>) {
        let weak = Arc::downgrade(observer);
        self.state.lock().observers.retain(|o| !o.ptr_eq(&weak));
    }

    /// Number of observers still alive
    pub fn observer_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locks > 0
    }

    pub fn notify(&self) {
        {
            let mut state = self.state.lock();
            if state.locks > 0 {
                state.pending = true;
                return;
            }
        }
        self.deliver();
    }

    pub fn lock(&self) {
        self.state.lock().locks += 1;
    }

    pub fn unlock(&self) {
        let deliver = {
            let mut state = self.state.lock();
            state.locks = state.locks.saturating_sub(1);
            if state.locks == 0 && state.pending {
                state.pending = false;
                true
            } else {
                false
            }
        };
        if deliver {
            self.deliver();
        }
    }

    fn deliver(&self) {
        // observers may call back into the item, so the state lock is not
        // held while they run
        let observers: Vec<Arc<dyn Observer>> = {
            let mut state = self.state.lock();
            state.observers.retain(|o| o.strong_count() > 0);
            state.observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.update(self.id);
        }
    }
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Subject")
            .field("id", &self.id)
            .field("observers", &state.observers.len())
            .field("locks", &state.locks)
            .finish()
    }
}

/// Suppresses notifications of a subject for its lifetime
#[must_use = "notifications resume when the locker is dropped"]
pub struct SubjectLocker<'a> {
    subject: &'a Subject,
}

impl<'a> SubjectLocker<'a> {
    pub fn new(subject: &'a Subject) -> Self {
        subject.lock();
        Self { subject }
    }
}

impl Drop for SubjectLocker<'_> {
    fn drop(&mut self) {
        self.subject.unlock();
    }
}

#[cfg(test)]
mod tests;
