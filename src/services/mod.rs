pub mod background_jobs;
pub mod poll_service;
pub mod realtime_service;
pub mod vote_service;
