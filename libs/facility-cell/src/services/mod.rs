pub mod grid;
pub mod index;

pub use grid::{Grid, GridCell};
pub use index::FacilityIndex;
