mod loader;

pub use loader::{Config, MergeConfig, OverridesConfig, ReportConfig};
