pub mod coordinator;
pub mod sweeper;

pub use coordinator::ReservationCoordinator;
pub use sweeper::HoldSweeper;
