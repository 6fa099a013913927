pub mod assembler;
pub mod controller;
pub mod error;
pub mod events;
pub mod state;

pub use assembler::assemble;
pub use controller::{run_controller, Phase};
pub use error::AgentError;
pub use events::AgentEvent;
pub use state::{
    Attachment, ConversationState, Message, Role, StateEntry, ToolInvocation,
    ToolInvocationResult, ToolOutput,
};
