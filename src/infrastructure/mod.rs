pub mod category_repository;
pub mod config;
pub mod error;
pub mod storage;
pub mod task_repository;
