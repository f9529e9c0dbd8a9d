pub mod cities;
pub mod health;
pub mod scheduler;
pub mod summaries;
