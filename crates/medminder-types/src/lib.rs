pub mod api;
pub mod clock;
pub mod models;
pub mod schedule;
