pub mod container;
pub mod dedup;
pub mod error;
pub mod finder;
pub mod item;
pub mod listing;
pub mod queue;
pub mod report;

pub use error::DiscfitError;
