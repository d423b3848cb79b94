//! Resource handlers mounted behind the request authenticator.

pub mod awards;
pub mod profiles;
pub mod users;
