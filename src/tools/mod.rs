pub mod context;
pub mod dispatcher;
pub mod echo;
pub mod filesystem;
pub mod progress;
pub mod registry;

pub use context::SessionContext;
pub use dispatcher::ToolDispatcher;
pub use echo::EchoTool;
pub use filesystem::{CatTool, LsTool, SafeFs};
pub use progress::{NullProgressSink, ProgressSink, ProgressStage, TracingProgressSink};
pub use registry::{Tool, ToolRegistry};
