use core::fmt;
use core::num::NonZeroU32;

/// Identifier a graph hands out when a node joins it. Ids are allocated
/// sequentially and never reused, so they stay valid across removals.
///
/// Backed by `NonZeroU32`: `Option<Id>` is no larger than `Id`, and the
/// stored value is the 0-based allocation index plus one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    pub fn from_index(index: u32) -> Self {
        // index + 1 cannot be zero
        Self(NonZeroU32::new(index + 1).expect("id index overflow"))
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

pub type NodeId = Id;
