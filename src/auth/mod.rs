pub mod middleware;
pub mod session;

pub use session::{current_username, login, logout, SESSION_USER_ID, SESSION_USERNAME};
