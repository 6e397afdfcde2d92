pub mod candidates;
pub mod context;
pub mod providers;
pub mod ranking;
pub mod reasons;
pub mod recommendations;
pub mod scoring;
pub mod tours;

pub use candidates::{CandidateSelector, CandidateSet};
pub use context::ContextDeriver;
pub use reasons::ReasonGenerator;
pub use recommendations::{PipelineOptions, RecommendationService};
pub use tours::TourService;
