pub mod admin;
pub mod auth;
pub mod backup;
pub mod core;
pub mod notifications;
pub mod photos;
pub mod scores;
pub mod students;
pub mod teachers;
