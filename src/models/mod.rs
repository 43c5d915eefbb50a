pub mod signup;
pub mod user;

pub use signup::{FieldError, FormErrors, SignupForm, SignupRequest};
pub use user::{Profile, User, UserSummary};
