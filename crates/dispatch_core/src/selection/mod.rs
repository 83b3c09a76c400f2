pub mod candidates;
pub mod destination;

pub use candidates::{CandidateSelector, RankedCandidate};
pub use destination::{DestinationChoice, DestinationSelector, RankingPolicy};
