pub mod paths;
pub mod recent;
pub mod settings;
