#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod broker;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod history;
pub mod matching;
pub mod notifier;
pub mod processors;
pub mod store;
#[cfg(test)]
mod testing;
pub mod utils;
