// src/handlers/mod.rs

pub mod auth;
pub mod exam;
pub mod exam_history;
pub mod question;
pub mod subject;
pub mod topic;
pub mod user;
