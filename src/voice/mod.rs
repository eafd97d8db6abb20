pub mod adapter;
pub mod processor;
pub mod registry;
pub mod settings;
