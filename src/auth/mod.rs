pub mod auth;
pub mod permissions;
pub mod session;
pub mod user;

pub use auth::*;
pub use permissions::*;
pub use session::*;
pub use user::*;
