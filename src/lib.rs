pub mod config;
pub mod etl;
pub mod extract;
pub mod model;
pub mod sink;
pub mod storage;
pub mod transform;
