pub mod client_ip;
pub mod security_headers;

pub use client_ip::{ClientIp, UNKNOWN_CLIENT};
pub use security_headers::add_security_headers;
