//! LLM provider abstraction and the replaying chat client.

pub mod box_provider;
pub mod client;
pub mod provider;
pub mod replay;

#[cfg(test)]
pub(crate) mod fake;
