//! User management
//!
//! Administrative CRUD over accounts. Every route in this area requires an
//! authenticated caller with role `admin`.

pub mod service;

pub use service::{CreateUserRequest, UpdateUserRequest, UserListParams, UserService};
