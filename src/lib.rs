pub mod settings;
pub mod sink;
pub mod synthetic;
