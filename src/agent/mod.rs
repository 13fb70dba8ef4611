pub mod events;
pub mod invocation;
pub mod preamble;
pub mod runtime;

pub use events::{AgentEvent, ApprovalGate, EventSink};
pub use runtime::{Agent, Reply};
