//! Application Layer
//! Wires providers to the tags a build tool hands out

pub mod registry;

pub use registry::{ProviderRegistry, SharedProvider};
