pub mod internal;

pub use internal::{
    suggestion_id, EntityRecord, EntityState, Memory, RunRequest, Suggestion, SUGGESTION_ID_LEN,
};
