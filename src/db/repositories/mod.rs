pub mod ai_request;
pub mod attempt;
pub mod catalog;
pub mod logs;
pub mod quiz;
pub mod token;
pub mod user;
