pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod explorer;
pub mod mirror;
pub mod normalize;
