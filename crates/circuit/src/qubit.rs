//! Newtype index wrappers shared across the data model.
//!
//! The hot-loop routing engine in `telesabre-route` deliberately does *not*
//! use these: it indexes plain `Vec<usize>` the way `NLayout` does in the
//! single-core SABRE implementation this crate generalizes, because the
//! loop touches these indices millions of times per run. These newtypes
//! exist at the public boundary (`Architecture`, `Gate`, `Circuit`) where
//! type confusion between a core id, a virtual qubit and a physical qubit
//! is the kind of bug worth a compile error.

use std::fmt;

macro_rules! index_newtype {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, Eq, PartialEq)]
        #[derive(serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                $name(value as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_newtype!(VirtQubit);
index_newtype!(PhysQubit);
index_newtype!(CoreId);
