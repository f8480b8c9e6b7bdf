//! Interactive terminal chat for Parley.
//!
//! The chat loop reads drafts through the composer, hands them to the
//! conversation controller, and renders transcript events as they arrive:
//! a spinner while the reply is pending, raw chunks while it replays, and
//! markdown for history. Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod composer;
pub mod input;
pub mod loop_runner;
pub mod renderer;
pub mod transcript_view;
