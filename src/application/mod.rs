//! Application services: use cases over the repository traits.

pub mod accounts;
pub mod clock;
pub mod comments;
pub mod error;
pub mod feed;
pub mod follows;
pub mod forms;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod repos;
