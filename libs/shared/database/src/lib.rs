pub mod cache;
pub mod error;
pub mod retry;
pub mod supabase;

pub use cache::{CollectionKind, ReadCache};
pub use error::SupabaseError;
pub use retry::{RequestPriority, RequestQueue, RetryPolicy};
pub use supabase::SupabaseClient;
