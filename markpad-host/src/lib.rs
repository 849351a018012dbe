pub mod cli;
pub mod coordinator;
pub mod document;
pub mod insertion;
pub mod registry;
pub mod stdio;
pub mod ui;

#[cfg(test)]
mod testing;
