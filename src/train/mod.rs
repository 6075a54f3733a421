pub mod epoch_stats;
pub mod fit;
pub mod metrics;
pub mod train_config;
pub mod train_log;

pub use epoch_stats::EpochStats;
pub use metrics::Metric;
pub use train_config::FitConfig;
pub use train_log::TrainLog;
