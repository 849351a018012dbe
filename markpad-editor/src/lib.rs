pub mod bridge;
pub mod escape;
pub mod protocol;
