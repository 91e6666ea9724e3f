pub mod health;
pub mod production;

pub use health::*;
pub use production::*;
