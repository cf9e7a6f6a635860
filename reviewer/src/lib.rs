//! Code review workflow orchestrator.
//!
//! A review run threads one [`core::state::ReviewState`] through a fixed
//! pipeline of steps: parse the request, validate the repository URL, open a
//! ticket and a chat thread, clone and analyze the repository, then publish
//! the report. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (routing, transition rules,
//!   scoring). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (tracker, chat, LLM, git,
//!   filesystem) behind narrow traits so tests can script them.
//!
//! Orchestration modules ([`step`], [`looping`], [`start`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod start;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
