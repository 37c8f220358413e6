mod instruction_set;
mod program;

pub use instruction_set::{register_instruction_set, reset};
pub use program::parse_program;

pub type AppResult<T> = anyhow::Result<T>;
