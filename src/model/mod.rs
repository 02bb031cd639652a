pub mod config;
pub mod pitch;
pub mod score;
