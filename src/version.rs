/// Version of the software from the cargo package metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
