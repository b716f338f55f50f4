pub mod batch;
pub mod events;
pub mod photos;
pub mod runs;
pub mod session;
pub mod tools;
