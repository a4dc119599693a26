mod articles;
mod feeds;
mod groups;
mod schema;
mod search;
mod service;
mod types;

pub use articles::MAX_ARTICLES;
pub use schema::Database;
pub use search::QueryRejected;
pub use types::{Article, DatabaseError, Feed, Group, NewArticle, SearchHit};
