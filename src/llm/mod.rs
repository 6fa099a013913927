pub mod accumulator;
pub mod mock;
pub mod openai;
pub mod traits;

pub use accumulator::{StreamAccumulator, StreamOutcome};
pub use mock::{MockChatClient, ScriptedChatClient};
pub use openai::OpenAiClient;
pub use traits::{ChatClient, FragmentStream, InvocationDelta, StreamFragment, ToolSchema};
