pub mod algorithm;
pub mod nearest;
pub mod simple;

pub use algorithm::MatchingPolicy;
pub use nearest::NearestDriver;
pub use simple::FirstAvailable;
