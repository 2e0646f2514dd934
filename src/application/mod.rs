//! Application layer - services driving the ports.

pub mod capture;
pub mod dispatcher;
pub mod launcher;
pub mod scheduler;
pub mod segment_writer;
pub mod submission;
pub mod worker;
