pub mod add;
pub mod articles;
pub mod control;
pub mod delete;
pub mod fetch;
pub mod list;
