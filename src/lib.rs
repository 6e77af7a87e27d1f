// Library for tests to access modules

pub mod config;
pub mod counter_source;
pub mod daily_store;
pub mod hourly;
pub mod hub;
pub mod models;
pub mod monitor;
pub mod retention_worker;
pub mod routes;
pub mod smoothing;
