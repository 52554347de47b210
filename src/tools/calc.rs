/// Local arithmetic tools. These never touch the network.

use serde_json::{Value, json};

use super::args::Arguments;
use super::error::ToolError;

/// Integer sum of `a` and `b`.
pub fn add(args: &Arguments) -> Result<Value, ToolError> {
    let a = args.integer("a")?;
    let b = args.integer("b")?;
    let sum = a
        .checked_add(b)
        .ok_or_else(|| ToolError::invalid(format!("{a} + {b} overflows a 64-bit integer")))?;
    Ok(json!(sum))
}
