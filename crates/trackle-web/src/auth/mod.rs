pub mod cookie;
pub mod middleware;
