//! Recording session controller and its local clock.

mod clock;
mod controller;

pub use clock::ElapsedClock;
pub use controller::RecordingController;
