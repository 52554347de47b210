/// Tools Module
///
/// The operation catalogue and everything needed to execute a tool call:
/// argument validation, local arithmetic, and the upstream HTTP dispatch.

pub mod args;
pub mod calc;
pub mod error;
pub mod invoker;
pub mod registry;

pub use error::ToolError;
pub use invoker::Invoker;
pub use registry::Registry;
