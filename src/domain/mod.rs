pub mod interaction;
pub mod product;
pub mod search;
pub mod stats;
