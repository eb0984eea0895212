// src/models/mod.rs

pub mod auth_session;
pub mod exam;
pub mod exam_history;
pub mod question;
pub mod subject;
pub mod topic;
pub mod user;
