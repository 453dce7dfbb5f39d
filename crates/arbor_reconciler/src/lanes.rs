//! Priority lanes
//!
//! A lane is one bit; a set of lanes is the OR of several. Lower bits are
//! more urgent, so the highest-priority lane of a set is its lowest set bit.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use arbor_scheduler::{PriorityLevel, Scheduler};

use crate::flags::bit_flags;

bit_flags!(Lanes(u32) {
    NO_LANES = 0,
    SYNC = 0b0001,
    INPUT_CONTINUOUS = 0b0010,
    DEFAULT = 0b0100,
    IDLE = 0b1000,
});

/// A single lane
pub type Lane = Lanes;

impl Lanes {
    /// The empty lane
    pub const NO_LANE: Lane = Self::NO_LANES;

    /// Merge two lane sets
    #[inline]
    pub const fn merge(self, other: Lanes) -> Lanes {
        Self(self.0 | other.0)
    }

    /// Remove `other` from this set
    #[inline]
    pub const fn without(self, other: Lanes) -> Lanes {
        Self(self.0 & !other.0)
    }

    /// Most urgent lane in the set, or `NO_LANE`
    #[inline]
    pub const fn highest_priority(self) -> Lane {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Whether `subset` is fully included in this set
    #[inline]
    pub const fn includes(self, subset: Lanes) -> bool {
        self.contains(subset)
    }

    /// Scheduler priority used to run work for this lane set
    pub fn to_scheduler_priority(self) -> PriorityLevel {
        let lane = self.highest_priority();
        if lane == Self::SYNC {
            PriorityLevel::Immediate
        } else if lane == Self::INPUT_CONTINUOUS {
            PriorityLevel::UserBlocking
        } else if lane == Self::DEFAULT {
            PriorityLevel::Normal
        } else {
            PriorityLevel::Idle
        }
    }

    /// Lane used for updates issued at a scheduler priority
    pub fn from_scheduler_priority(priority: PriorityLevel) -> Lane {
        match priority {
            PriorityLevel::Immediate => Self::SYNC,
            PriorityLevel::UserBlocking => Self::INPUT_CONTINUOUS,
            // No lane of its own; low-priority updates render with default work
            PriorityLevel::Normal | PriorityLevel::Low => Self::DEFAULT,
            PriorityLevel::Idle => Self::IDLE,
        }
    }
}

/// Lane for an update issued right now
pub fn request_update_lane(scheduler: &dyn Scheduler) -> Lane {
    Lanes::from_scheduler_priority(scheduler.current_priority_level())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_is_lowest_bit() {
        let lanes = Lanes::DEFAULT | Lanes::IDLE | Lanes::INPUT_CONTINUOUS;
        assert_eq!(lanes.highest_priority(), Lanes::INPUT_CONTINUOUS);
        assert_eq!((Lanes::SYNC | Lanes::IDLE).highest_priority(), Lanes::SYNC);
        assert_eq!(Lanes::NO_LANES.highest_priority(), Lanes::NO_LANE);
    }

    #[test]
    fn test_subset() {
        let render = Lanes::SYNC | Lanes::DEFAULT;
        assert!(render.includes(Lanes::SYNC));
        assert!(!render.includes(Lanes::IDLE));
        assert!(render.includes(Lanes::NO_LANE));
    }

    #[test]
    fn test_merge_and_remove() {
        let lanes = Lanes::SYNC.merge(Lanes::DEFAULT);
        assert_eq!(lanes.without(Lanes::SYNC), Lanes::DEFAULT);
        assert!(lanes.without(lanes).is_empty());
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(Lanes::SYNC.to_scheduler_priority(), PriorityLevel::Immediate);
        assert_eq!(Lanes::INPUT_CONTINUOUS.to_scheduler_priority(), PriorityLevel::UserBlocking);
        assert_eq!(Lanes::DEFAULT.to_scheduler_priority(), PriorityLevel::Normal);
        assert_eq!(Lanes::IDLE.to_scheduler_priority(), PriorityLevel::Idle);

        assert_eq!(Lanes::from_scheduler_priority(PriorityLevel::Idle), Lanes::IDLE);
        assert_eq!(Lanes::from_scheduler_priority(PriorityLevel::Normal), Lanes::DEFAULT);
        assert_eq!(Lanes::from_scheduler_priority(PriorityLevel::Low), Lanes::DEFAULT);
    }
}
