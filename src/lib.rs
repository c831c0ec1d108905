pub mod api;
pub mod batch_driver;
pub mod models;
pub mod normalize;
pub mod updater;
pub mod utils;
