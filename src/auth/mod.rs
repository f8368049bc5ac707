pub mod middleware;
pub mod password;
pub mod role;
pub mod token;
