pub mod gate;
pub mod jwt;
pub mod observer;
pub mod scheduler;
pub mod test_utils;
