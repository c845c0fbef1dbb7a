pub mod codec;
pub mod edit_session;
pub mod header;
pub mod memo;
pub mod schema;
