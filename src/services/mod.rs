pub mod aggregator;
pub mod cycle;
pub mod fetcher;
pub mod openweather;
pub mod scheduler;
pub mod threshold;
pub mod units;
