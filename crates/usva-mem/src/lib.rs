pub mod vec_types;

mod errors;
mod raw_region;

pub use errors::CapacityError;
pub use raw_region::RawRegion;
pub use vec_types::{DynArray, Iter, IterMut};
