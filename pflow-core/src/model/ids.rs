//! Stable, allocation-order ids.
//!
//! The source this system is modelled on compares raw pointers to break
//! ties in candidate-selection loops. That is forbidden here: every id below orders by allocation order only, so operator
//! output does not depend on where an arena happened to place an entry.

use std::fmt;

macro_rules! stable_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Construct an id from its raw allocation index. Only the
            /// owning store should call this.
            #[must_use]
            pub const fn from_index(index: u32) -> Self {
                Self(index)
            }

            /// The raw allocation index.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

stable_id!(HitId, "Identifies a [`crate::model::hit::CaloHit`] in a `CaloHitStore`.");
stable_id!(ClusterId, "Identifies a [`crate::model::cluster::Cluster`] in a `ClusterStore`.");
stable_id!(TrackId, "Identifies a [`crate::model::track::Track`] in a `TrackStore`.");
