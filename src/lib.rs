pub mod ab_summary;
pub mod api;
pub mod fake_store;
pub mod normalize;
pub mod ranking;
pub mod resolver;
pub mod series;
pub mod session;
pub mod store;
pub mod trend;
