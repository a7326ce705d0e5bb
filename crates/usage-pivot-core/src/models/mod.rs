//! Domain models for usage pivoting.

mod cell;
mod draft;
mod gates;
mod lookup;
mod usage;

pub use cell::*;
pub use draft::*;
pub use gates::*;
pub use lookup::*;
pub use usage::*;
