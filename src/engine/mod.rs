pub mod accumulator;
pub mod shelves;

pub use accumulator::{FeedAccumulator, FeedState, FetchOutcome};
pub use shelves::{group_shelves, Shelf, ShelfView};
