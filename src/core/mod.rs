pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
