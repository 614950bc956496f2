//! Ring topology and acquisition order.
//!
//! Philosopher `i` sits between fork `i` (its left) and fork `(i + 1) mod N`
//! (its right). Forks are ranked by position and every philosopher takes its
//! lower-ranked fork first. The philosopher at the last seat is therefore the
//! only one that reaches right before left, which is what breaks the cycle in
//! the wait-for graph.

use crate::error::{CoreError, CoreResult};
use crate::id::{ForkId, PhilosopherId};
use serde::{Deserialize, Serialize};

/// Smallest ring with any contention
pub const MIN_SEATS: usize = 2;

/// The two forks wired to one seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wiring {
    /// Seat this wiring belongs to
    pub philosopher: PhilosopherId,
    /// Fork at the seat's own position
    pub left: ForkId,
    /// Fork at the next position around the ring
    pub right: ForkId,
}

impl Wiring {
    /// Fork to acquire first (lower rank)
    #[must_use]
    pub fn first(&self) -> ForkId {
        self.left.min(self.right)
    }

    /// Fork to acquire second (higher rank)
    #[must_use]
    pub fn second(&self) -> ForkId {
        self.left.max(self.right)
    }

    /// Whether this seat acquires right before left
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.right < self.left
    }

    /// Whether the seat uses `fork`
    #[must_use]
    pub fn touches(&self, fork: ForkId) -> bool {
        self.left == fork || self.right == fork
    }
}

/// Immutable seat-to-fork map computed once per table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    wiring: Vec<Wiring>,
}

impl Topology {
    /// Build the ring for `seats` philosophers
    ///
    /// # Errors
    ///
    /// Returns error if `seats` is below [`MIN_SEATS`]
    pub fn ring(seats: usize) -> CoreResult<Self> {
        if seats < MIN_SEATS {
            return Err(CoreError::TooFewSeats {
                seats,
                min: MIN_SEATS,
            });
        }

        let wiring = (0..seats)
            .map(|i| Wiring {
                philosopher: PhilosopherId::new(i),
                left: ForkId::new(i),
                right: ForkId::new((i + 1) % seats),
            })
            .collect();

        Ok(Self { wiring })
    }

    /// Number of seats (and forks)
    #[must_use]
    pub fn seats(&self) -> usize {
        self.wiring.len()
    }

    /// Wiring for one seat
    #[must_use]
    pub fn wiring(&self, philosopher: PhilosopherId) -> Option<&Wiring> {
        self.wiring.get(philosopher.index())
    }

    /// All seats in order
    pub fn iter(&self) -> impl Iterator<Item = &Wiring> {
        self.wiring.iter()
    }

    /// All philosopher IDs in seat order
    pub fn philosophers(&self) -> impl Iterator<Item = PhilosopherId> + '_ {
        self.wiring.iter().map(|w| w.philosopher)
    }

    /// All fork IDs in ring order
    pub fn forks(&self) -> impl Iterator<Item = ForkId> + '_ {
        self.wiring.iter().map(|w| w.left)
    }

    /// The two seats sharing `fork`, as `(right-hand user, left-hand user)`
    ///
    /// Fork `i` is the right fork of seat `i - 1` and the left fork of seat `i`.
    #[must_use]
    pub fn sharers(&self, fork: ForkId) -> Option<(PhilosopherId, PhilosopherId)> {
        let n = self.seats();
        let i = fork.index();
        if i >= n {
            return None;
        }
        Some((PhilosopherId::new((i + n - 1) % n), PhilosopherId::new(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ring_rejects_small_tables() {
        assert_eq!(
            Topology::ring(0),
            Err(CoreError::TooFewSeats { seats: 0, min: 2 })
        );
        assert!(Topology::ring(1).is_err());
        assert!(Topology::ring(2).is_ok());
    }

    #[test]
    fn test_ring_of_two() {
        let topology = Topology::ring(2).unwrap();
        let p0 = topology.wiring(PhilosopherId::new(0)).unwrap();
        let p1 = topology.wiring(PhilosopherId::new(1)).unwrap();

        assert_eq!((p0.left, p0.right), (ForkId::new(0), ForkId::new(1)));
        assert_eq!((p1.left, p1.right), (ForkId::new(1), ForkId::new(0)));

        // Both reach for F0 first, so they cannot each hold one fork.
        assert_eq!(p0.first(), ForkId::new(0));
        assert_eq!(p1.first(), ForkId::new(0));
    }

    #[test]
    fn test_only_last_seat_is_reversed() {
        let topology = Topology::ring(5).unwrap();
        let reversed: Vec<_> = topology
            .iter()
            .filter(|w| w.is_reversed())
            .map(|w| w.philosopher)
            .collect();
        assert_eq!(reversed, vec![PhilosopherId::new(4)]);
    }

    #[test]
    fn test_sharers() {
        let topology = Topology::ring(4).unwrap();
        assert_eq!(
            topology.sharers(ForkId::new(0)),
            Some((PhilosopherId::new(3), PhilosopherId::new(0)))
        );
        assert_eq!(
            topology.sharers(ForkId::new(2)),
            Some((PhilosopherId::new(1), PhilosopherId::new(2)))
        );
        assert_eq!(topology.sharers(ForkId::new(4)), None);
    }

    #[test]
    fn test_wiring_lookup_out_of_range() {
        let topology = Topology::ring(3).unwrap();
        assert!(topology.wiring(PhilosopherId::new(3)).is_none());
        assert_eq!(topology.forks().count(), 3);
        assert_eq!(topology.philosophers().count(), 3);
    }

    proptest! {
        #[test]
        fn prop_every_fork_has_exactly_two_users(seats in 2usize..64) {
            let topology = Topology::ring(seats).unwrap();
            for fork in topology.forks() {
                let users = topology.iter().filter(|w| w.touches(fork)).count();
                prop_assert_eq!(users, 2);

                let (a, b) = topology.sharers(fork).unwrap();
                prop_assert!(topology.wiring(a).unwrap().touches(fork));
                prop_assert!(topology.wiring(b).unwrap().touches(fork));
            }
        }

        #[test]
        fn prop_acquisition_order_is_increasing(seats in 2usize..64) {
            let topology = Topology::ring(seats).unwrap();
            for wiring in topology.iter() {
                prop_assert!(wiring.first() < wiring.second());
                prop_assert!(wiring.touches(wiring.first()));
                prop_assert!(wiring.touches(wiring.second()));
            }
        }

        #[test]
        fn prop_exactly_one_reversed_seat(seats in 2usize..64) {
            let topology = Topology::ring(seats).unwrap();
            let reversed = topology.iter().filter(|w| w.is_reversed()).count();
            prop_assert_eq!(reversed, 1);
        }
    }
}
