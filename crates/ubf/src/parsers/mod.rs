pub mod errors;
mod lexer;
mod reaction;
mod record;

pub use errors::{ReactionError, ReactionErrorKind};
pub use reaction::parse_reaction;
pub use record::parse_records;
