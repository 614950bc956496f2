//! Forks: mutually exclusive resources shared by two neighbours.
//!
//! A fork records who holds it so that misuse (double acquire, release by a
//! non-holder) is reported as a [`ProtocolViolation`] instead of corrupting
//! state for the neighbour.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use symposium_core::{ForkId, PhilosopherId, ProtocolViolation};

/// Mutually exclusive resource with blocking acquire
///
/// Implementations may wrap another fork to add timing or logging, as long
/// as the holder is recorded inside the inner fork's critical section.
pub trait Fork: Send + Sync {
    /// Ring position of this fork
    fn id(&self) -> ForkId;

    /// Block until the fork is free, then take it for `who`
    ///
    /// # Errors
    ///
    /// Returns `AlreadyHeld` if `who` already holds this fork
    fn acquire(&self, who: PhilosopherId) -> Result<(), ProtocolViolation>;

    /// Give the fork back and wake a waiter
    ///
    /// # Errors
    ///
    /// Returns `NotHolder` if `who` does not hold this fork
    fn release(&self, who: PhilosopherId) -> Result<(), ProtocolViolation>;

    /// Current holder, if any
    fn holder(&self) -> Option<PhilosopherId>;

    /// Number of philosophers blocked in `acquire`
    fn waiting(&self) -> usize;

    /// Whether someone holds the fork
    fn is_held(&self) -> bool {
        self.holder().is_some()
    }
}

/// Builds the fork for each ring position
pub type ForkFactory = Box<dyn Fn(ForkId) -> Arc<dyn Fork> + Send + Sync>;

#[derive(Debug, Default)]
struct Slot {
    holder: Option<PhilosopherId>,
    waiters: usize,
}

/// Fork that wakes one arbitrary waiter on release
///
/// No ordering is promised between waiters; whichever thread the OS wakes
/// and reschedules first takes the fork.
#[derive(Debug)]
pub struct DefaultFork {
    id: ForkId,
    slot: Mutex<Slot>,
    freed: Condvar,
}

impl DefaultFork {
    /// Create a free fork
    #[must_use]
    pub fn new(id: ForkId) -> Self {
        Self {
            id,
            slot: Mutex::new(Slot::default()),
            freed: Condvar::new(),
        }
    }

    /// Factory producing default forks
    #[must_use]
    pub fn factory() -> ForkFactory {
        Box::new(|id| Arc::new(Self::new(id)) as Arc<dyn Fork>)
    }
}

impl Fork for DefaultFork {
    fn id(&self) -> ForkId {
        self.id
    }

    fn acquire(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        let mut slot = self.slot.lock();
        if slot.holder == Some(who) {
            return Err(ProtocolViolation::AlreadyHeld {
                fork: self.id,
                caller: who,
            });
        }

        slot.waiters += 1;
        while slot.holder.is_some() {
            self.freed.wait(&mut slot);
        }
        slot.waiters -= 1;
        slot.holder = Some(who);
        Ok(())
    }

    fn release(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        let mut slot = self.slot.lock();
        if slot.holder != Some(who) {
            return Err(ProtocolViolation::NotHolder {
                fork: self.id,
                caller: who,
                holder: slot.holder,
            });
        }
        slot.holder = None;
        drop(slot);
        self.freed.notify_one();
        Ok(())
    }

    fn holder(&self) -> Option<PhilosopherId> {
        self.slot.lock().holder
    }

    fn waiting(&self) -> usize {
        self.slot.lock().waiters
    }
}

#[derive(Debug, Default)]
struct TicketQueue {
    holder: Option<PhilosopherId>,
    next_ticket: u64,
    now_serving: u64,
}

/// Fork that serves waiters strictly in arrival order
///
/// Each `acquire` draws a ticket and waits until that ticket is served, so a
/// waiter is overtaken by nobody who arrived after it.
#[derive(Debug)]
pub struct FairFork {
    id: ForkId,
    queue: Mutex<TicketQueue>,
    turn: Condvar,
}

impl FairFork {
    /// Create a free fork
    #[must_use]
    pub fn new(id: ForkId) -> Self {
        Self {
            id,
            queue: Mutex::new(TicketQueue::default()),
            turn: Condvar::new(),
        }
    }

    /// Factory producing FIFO forks
    #[must_use]
    pub fn factory() -> ForkFactory {
        Box::new(|id| Arc::new(Self::new(id)) as Arc<dyn Fork>)
    }
}

impl Fork for FairFork {
    fn id(&self) -> ForkId {
        self.id
    }

    fn acquire(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        let mut queue = self.queue.lock();
        if queue.holder == Some(who) {
            return Err(ProtocolViolation::AlreadyHeld {
                fork: self.id,
                caller: who,
            });
        }

        let ticket = queue.next_ticket;
        queue.next_ticket += 1;
        while queue.now_serving != ticket || queue.holder.is_some() {
            self.turn.wait(&mut queue);
        }
        queue.holder = Some(who);
        Ok(())
    }

    fn release(&self, who: PhilosopherId) -> Result<(), ProtocolViolation> {
        let mut queue = self.queue.lock();
        if queue.holder != Some(who) {
            return Err(ProtocolViolation::NotHolder {
                fork: self.id,
                caller: who,
                holder: queue.holder,
            });
        }
        queue.holder = None;
        queue.now_serving += 1;
        drop(queue);
        // Waiters share one condvar; only the next ticket proceeds.
        self.turn.notify_all();
        Ok(())
    }

    fn holder(&self) -> Option<PhilosopherId> {
        self.queue.lock().holder
    }

    fn waiting(&self) -> usize {
        let queue = self.queue.lock();
        let issued = queue.next_ticket - queue.now_serving;
        let held = u64::from(queue.holder.is_some());
        usize::try_from(issued - held).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn p(i: usize) -> PhilosopherId {
        PhilosopherId::new(i)
    }

    fn wait_for_waiters(fork: &dyn Fork, count: usize) {
        while fork.waiting() < count {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn check_exclusion(fork: Arc<dyn Fork>) {
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let fork = Arc::clone(&fork);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..500 {
                        fork.acquire(p(i)).unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        fork.release(p(i)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!fork.is_held());
    }

    #[test]
    fn test_default_fork_acquire_release() {
        let fork = DefaultFork::new(ForkId::new(0));
        assert_eq!(fork.holder(), None);

        fork.acquire(p(1)).unwrap();
        assert_eq!(fork.holder(), Some(p(1)));
        assert!(fork.is_held());

        fork.release(p(1)).unwrap();
        assert_eq!(fork.holder(), None);
    }

    #[test]
    fn test_default_fork_double_acquire() {
        let fork = DefaultFork::new(ForkId::new(2));
        fork.acquire(p(0)).unwrap();
        assert_eq!(
            fork.acquire(p(0)),
            Err(ProtocolViolation::AlreadyHeld {
                fork: ForkId::new(2),
                caller: p(0)
            })
        );
        // The holder is unchanged
        assert_eq!(fork.holder(), Some(p(0)));
    }

    #[test]
    fn test_default_fork_release_by_non_holder() {
        let fork = DefaultFork::new(ForkId::new(1));
        assert!(matches!(
            fork.release(p(0)),
            Err(ProtocolViolation::NotHolder { holder: None, .. })
        ));

        fork.acquire(p(1)).unwrap();
        assert_eq!(
            fork.release(p(0)),
            Err(ProtocolViolation::NotHolder {
                fork: ForkId::new(1),
                caller: p(0),
                holder: Some(p(1)),
            })
        );
        assert_eq!(fork.holder(), Some(p(1)));
    }

    #[test]
    fn test_default_fork_blocks_until_released() {
        let fork = Arc::new(DefaultFork::new(ForkId::new(0)));
        fork.acquire(p(0)).unwrap();

        let contender = {
            let fork = Arc::clone(&fork);
            thread::spawn(move || {
                fork.acquire(p(1)).unwrap();
                fork.holder()
            })
        };

        wait_for_waiters(&*fork, 1);
        assert_eq!(fork.holder(), Some(p(0)));
        fork.release(p(0)).unwrap();

        assert_eq!(contender.join().unwrap(), Some(p(1)));
        assert_eq!(fork.waiting(), 0);
    }

    #[test]
    fn test_default_fork_mutual_exclusion() {
        check_exclusion(Arc::new(DefaultFork::new(ForkId::new(0))));
    }

    #[test]
    fn test_fair_fork_mutual_exclusion() {
        check_exclusion(Arc::new(FairFork::new(ForkId::new(0))));
    }

    #[test]
    fn test_fair_fork_serves_in_arrival_order() {
        let fork = Arc::new(FairFork::new(ForkId::new(0)));
        let order = Arc::new(Mutex::new(Vec::new()));
        fork.acquire(p(0)).unwrap();

        let mut handles = Vec::new();
        for i in 1..=3 {
            let fork_clone = Arc::clone(&fork);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                fork_clone.acquire(p(i)).unwrap();
                order.lock().push(i);
                fork_clone.release(p(i)).unwrap();
            }));
            // Make sure each waiter has its ticket before the next arrives
            wait_for_waiters(&*fork, i);
        }

        fork.release(p(0)).unwrap();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*order.lock(), vec![1, 2, 3]);
        assert_eq!(fork.waiting(), 0);
    }

    #[test]
    fn test_fair_fork_protocol_errors() {
        let fork = FairFork::new(ForkId::new(3));
        fork.acquire(p(2)).unwrap();
        assert!(matches!(
            fork.acquire(p(2)),
            Err(ProtocolViolation::AlreadyHeld { .. })
        ));
        assert!(matches!(
            fork.release(p(3)),
            Err(ProtocolViolation::NotHolder { .. })
        ));
        // A failed acquire does not consume a ticket
        assert_eq!(fork.waiting(), 0);
        fork.release(p(2)).unwrap();
        fork.acquire(p(3)).unwrap();
        assert_eq!(fork.holder(), Some(p(3)));
    }

    #[test]
    fn test_factories() {
        let fork = (DefaultFork::factory())(ForkId::new(4));
        assert_eq!(fork.id(), ForkId::new(4));
        let fork = (FairFork::factory())(ForkId::new(5));
        assert_eq!(fork.id(), ForkId::new(5));
    }
}
