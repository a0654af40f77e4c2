pub mod collect;
pub mod config;
pub mod db;
pub mod interval;
pub mod reconcile;
pub mod source;
pub mod timeseries;
pub mod utils;
