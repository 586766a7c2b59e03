pub mod process;
pub mod thread;

pub use process::{ProcessLauncher, DEFAULT_EXIT_GRACE};
pub use thread::ThreadLauncher;
