//! Model scoring components

pub mod adapter;
pub mod group;
pub mod loader;
pub mod predictor;
pub mod runner;

pub use adapter::ModelAdapter;
pub use group::ModelGroup;
pub use loader::{ModelProvider, SpecFileModelProvider};
pub use runner::ModelRunner;
