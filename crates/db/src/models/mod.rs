pub mod document;
pub mod flow;
pub mod note;
pub mod query;
pub mod resource;
pub mod schema;
pub mod task;
pub mod user;
