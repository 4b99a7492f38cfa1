pub mod error;
pub mod geo;
pub mod schedule;

pub use geo::GeoPoint;
pub use schedule::{ServiceCode, TimeWindow, UrgencyTier};
