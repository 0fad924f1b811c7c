// brickbot_core/src/feedback/mod.rs

pub mod pid;
