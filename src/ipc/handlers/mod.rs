pub mod backup_exchange;
pub mod core;
pub mod scores;
pub mod sections;
pub mod students;
