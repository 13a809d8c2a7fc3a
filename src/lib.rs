pub mod assemble;
pub mod booster;
pub mod clean;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod logging;
pub mod metrics;
pub mod names;
pub mod pipeline;
pub mod predict;
pub mod ranking;
pub mod records;
pub mod report;
pub mod scorer;
pub mod split;
pub mod tables;
