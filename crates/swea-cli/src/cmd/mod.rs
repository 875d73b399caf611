pub mod agent;
pub mod chat;
pub mod logs;
pub mod project;
pub mod serve;
pub mod settings;
pub mod status;
