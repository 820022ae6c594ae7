pub mod clip;
pub mod controller;

#[cfg(test)]
pub(crate) mod fakes;

pub use clip::Clip;
pub use controller::{CompletedTake, ControllerSettings, ControllerState, RecordingController};
