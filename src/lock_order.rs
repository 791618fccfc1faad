//! Checks the global client -> topic -> partition lock order.
//!
//! The check only runs in test builds: [`enter`] records the level being
//! acquired on a thread-local stack and panics if it is not strictly
//! greater than whatever is already held, which is exactly what a lock
//! taken out of order would do. Release builds compile the checker away to
//! a zero-sized no-op.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Level {
    Client,
    Topic,
    Partition,
}

#[cfg(test)]
mod checked {
    use super::Level;
    use std::cell::RefCell;

    thread_local! {
        static HELD: RefCell<Vec<Level>> = const { RefCell::new(Vec::new()) };
    }

    pub(crate) struct Guard(Level);

    impl Drop for Guard {
        fn drop(&mut self) {
            HELD.with(|held| {
                let popped = held.borrow_mut().pop();
                debug_assert_eq!(popped, Some(self.0), "lock_order guard stack corrupted");
            });
        }
    }

    pub(crate) fn enter(level: Level) -> Guard {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(&top) = held.last() {
                // Same-level siblings are fine (e.g. two partitions locked
                // to move messages between them); only acquiring a level
                // closer to `Client` while a deeper one is held is an
                // inversion.
                assert!(
                    top <= level,
                    "lock order violation: tried to acquire {level:?} while already holding {top:?}",
                );
            }
            held.push(level);
        });
        Guard(level)
    }
}

#[cfg(not(test))]
mod checked {
    use super::Level;

    pub(crate) struct Guard;

    #[inline(always)]
    pub(crate) fn enter(_level: Level) -> Guard {
        Guard
    }
}

pub(crate) use checked::{enter, Guard};

/// Wraps a lock guard with the order check for as long as it's held.
pub(crate) struct Tracked<G> {
    inner: G,
    _order: Guard,
}

impl<G> Tracked<G> {
    pub(crate) fn new(inner: G, level: Level) -> Self {
        Self {
            inner,
            _order: enter(level),
        }
    }
}

impl<G> std::ops::Deref for Tracked<G> {
    type Target = G;

    fn deref(&self) -> &G {
        &self.inner
    }
}

impl<G> std::ops::DerefMut for Tracked<G> {
    fn deref_mut(&mut self) -> &mut G {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_order_is_allowed() {
        let _client = enter(Level::Client);
        let _topic = enter(Level::Topic);
        let _partition = enter(Level::Partition);
    }

    #[test]
    #[should_panic(expected = "lock order violation")]
    fn acquiring_client_while_holding_topic_panics() {
        let _topic = enter(Level::Topic);
        let _client = enter(Level::Client);
    }

    #[test]
    fn acquiring_two_same_level_siblings_is_allowed() {
        let _a = enter(Level::Partition);
        let _b = enter(Level::Partition);
    }

    #[test]
    fn releasing_lets_the_same_level_be_reacquired() {
        {
            let _topic = enter(Level::Topic);
        }
        let _topic_again = enter(Level::Topic);
    }
}
