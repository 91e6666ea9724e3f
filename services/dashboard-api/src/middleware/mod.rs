pub mod permissions;
pub mod request_id;

pub use permissions::*;
pub use request_id::*;
