pub use unirpc_client::*;
pub use unirpc_protocol::*;
