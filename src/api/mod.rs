//! REST API of the signup controller
pub mod v1;
