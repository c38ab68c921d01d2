mod core;
mod history;
mod state;
mod streaming;

#[cfg(test)]
mod tests;

pub use history::{system_instruction, to_api_messages};
pub use state::{ConsoleManager, TurnOutcome, TurnUpdate};
