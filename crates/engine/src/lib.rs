pub mod dispatch;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod retry;
