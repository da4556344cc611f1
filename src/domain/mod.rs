pub mod clock;
pub mod models;
pub mod next_event;
pub mod verses;
