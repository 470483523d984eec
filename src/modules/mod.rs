pub mod config;
pub mod logger;

pub use config::get_data_dir;
