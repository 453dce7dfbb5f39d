//! Effect flags on fibers and hook effects

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

macro_rules! bit_flags {
    ($name:ident($repr:ty) { $($flag:ident = $bits:expr),* $(,)? }) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $flag: Self = Self($bits);)*

            /// Build from raw bits
            #[inline]
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            /// Raw bits
            #[inline]
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// No bit set
            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Every bit of `other` is set
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Any bit of `other` is set
            #[inline]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Set the bits of `other`
            #[inline]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear the bits of `other`
            #[inline]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self(!self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = [$((stringify!($flag), Self::$flag)),*]
                    .iter()
                    .filter(|(_, flag)| !flag.is_empty() && self.contains(*flag))
                    .map(|(name, _)| *name)
                    .collect();
                if names.is_empty() {
                    write!(f, "{}(empty)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), names.join(" | "))
                }
            }
        }
    };
}

pub(crate) use bit_flags;

bit_flags!(Flags(u16) {
    NO_FLAGS = 0,
    PLACEMENT = 0b0000_0010,
    UPDATE = 0b0000_0100,
    PASSIVE_EFFECT = 0b0000_1000,
    CHILD_DELETION = 0b0001_0000,
    REF = 0b0010_0000,
});

impl Flags {
    /// Flags handled by the mutation pass
    pub const MUTATION_MASK: Self = Self(Self::PLACEMENT.0 | Self::UPDATE.0 | Self::CHILD_DELETION.0 | Self::REF.0);
    /// Flags that leave passive effect work behind
    pub const PASSIVE_MASK: Self = Self(Self::PASSIVE_EFFECT.0 | Self::CHILD_DELETION.0);
}

bit_flags!(HookFlags(u8) {
    NO_HOOK_FLAGS = 0,
    HAS_EFFECT = 0b0001,
    PASSIVE = 0b1000,
});
