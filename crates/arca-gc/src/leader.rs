use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether this instance should perform cluster-wide mutations.
pub trait LeaderElection: Send + Sync {
    fn is_this_instance_leader(&self) -> bool;
}

/// Single-instance deployments: always the leader.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLeader;

impl LeaderElection for AlwaysLeader {
    fn is_this_instance_leader(&self) -> bool {
        true
    }
}

/// Leadership fixed by configuration, switchable at runtime.
#[derive(Debug, Default)]
pub struct StaticLeader {
    leader: AtomicBool,
}

impl StaticLeader {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
        }
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::Release);
    }
}

impl LeaderElection for StaticLeader {
    fn is_this_instance_leader(&self) -> bool {
        self.leader.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_leader_toggles() {
        let leader = StaticLeader::new(false);
        assert!(!leader.is_this_instance_leader());
        leader.set_leader(true);
        assert!(leader.is_this_instance_leader());
        assert!(AlwaysLeader.is_this_instance_leader());
    }
}
