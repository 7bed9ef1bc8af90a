mod persist;
mod validation;

// Atomic file output
pub use persist::{atomic_write, atomic_write_json, read_json};

// Input validation
pub use validation::{valid_audio, valid_ratio};
