#![allow(dead_code)]

pub mod mock_repo;
pub mod recording_progress;
