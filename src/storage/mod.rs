pub mod store;

pub use store::{StoreError, SuggestionStore, HISTORY_CAP};
