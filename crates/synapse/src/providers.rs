pub mod base;
pub mod configs;
pub mod factory;
pub mod openai;
pub mod openai_responses;
pub mod stream;
pub mod utils;

#[cfg(test)]
pub mod mock;
