use core::fmt;
use core::num::NonZeroU32;

/// Compact, stable identifier for a mesh point or a variable slot in the
/// NLP's flat state vector.
///
/// - `u32` keeps memory small even for a fine collocation mesh.
/// - `NonZero` lets `Option<Id>` be pointer-sized, which matters for the
///   fix/unfix bookkeeping the staged driver does per variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::new(index + 1).expect("index+1 is nonzero"))
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

/// A mesh point (one collocation root or one backward-Euler boundary).
pub type MeshPointId = Id;
/// A scalar entry in the NLP's flat variable vector.
pub type VarId = Id;
/// A finite element within the discretized horizon.
pub type ElementId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let id = Id::from_index(i);
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }
}
