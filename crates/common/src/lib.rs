pub mod config;
pub mod error;
pub mod health;
pub mod propagation;
pub mod types;
