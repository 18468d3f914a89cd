pub mod file_session_store;
pub mod supabase_session_store;
