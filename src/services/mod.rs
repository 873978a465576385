//! Request-scoped business flows on top of the store and upstream clients
pub mod participation;
