pub mod codec;
pub mod error;
pub mod request;

pub use codec::*;
pub use error::*;
pub use request::*;
