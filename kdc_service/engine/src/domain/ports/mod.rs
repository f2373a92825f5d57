pub mod config_entry;
pub mod process_tree;
pub mod readiness_probe;
pub mod service_definition;

pub use config_entry::{ConfigEntry, RenderContext};
pub use process_tree::{ProcessTreeControl, children_from_table};
pub use readiness_probe::ReadinessProbe;
pub use service_definition::{LaunchSpec, ServiceDefinition};
