pub mod cloud;
pub mod fusion;
pub mod geometry;
pub mod io;
pub mod loop_rebuild;
pub mod map;
pub mod system;
