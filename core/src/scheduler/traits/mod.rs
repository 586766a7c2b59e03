pub mod launcher;
pub mod progress;

pub use launcher::*;
pub use progress::*;
