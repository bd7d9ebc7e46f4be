pub mod client;
pub mod configstore;
pub mod registry;
pub mod transport;

pub use client::*;
pub use configstore::*;
pub use registry::*;
pub use transport::*;
