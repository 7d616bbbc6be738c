pub mod model;
pub mod parser;

// Re-export commonly used types
pub use model::{
    Command, CommandResult, CommandStatus, CommandType, TransitionError, UnknownCommandType,
};
pub use parser::{CommandParser, split_token_prefix};
