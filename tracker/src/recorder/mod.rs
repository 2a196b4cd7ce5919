pub mod keys;
pub mod state;

pub use state::{RecorderError, RecordingStateMachine, Transition};
