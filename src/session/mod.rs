//! The two roles of the binary.
//!
//! - [`chat`]: the host side, an interactive terminal loop that supervises
//!   the sandbox child
//! - [`serve`]: the sandbox side, which runs the agent and speaks the line
//!   protocol on stdin and stdout

pub mod chat;
pub mod serve;
