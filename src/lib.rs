pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod preview;
pub mod protocol;
pub mod state;
#[cfg(test)]
pub mod test_support;
pub mod types;
pub mod util;
