//! The execution loop and the research agent hierarchy.
//!
//! Every agent runs the same cycle:
//!
//! 1. **Start** a fresh transcript: `[system: instructions, user: input]`
//! 2. **Call the model** with the transcript, the agent's tool schemas and
//!    its sampling parameters
//! 3. **If tool calls**: dispatch them concurrently, append the results in
//!    request order, loop back to step 2
//! 4. **If text**: that text is the final output
//!
//! An agent exposed as a tool runs this same cycle, nested inside its
//! caller's tool dispatch. The loop stops at the first text answer, on a
//! terminal error, or when the turn budget runs out.

pub mod loop_runner;
pub mod research;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{LoopResult, Runner, RunnerConfig};
pub use research::build_director;
