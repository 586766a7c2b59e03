mod load;
mod types;

pub use load::{apply_env_overrides, get_data_dir, load, load_default, load_from_path, parse};
pub use types::{AppConfig, LauncherKind, LoggingConfig, ScanConfig, SchedulerSection};
