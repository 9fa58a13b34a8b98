//! Token admission for detected pools

pub mod watchlist;

pub use watchlist::{is_watched, Watchlist};
