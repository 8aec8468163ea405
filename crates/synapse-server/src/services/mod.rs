//! Business operations behind the routes. Services assign ids, call the
//! embedding provider and hand finished rows to the repository.

pub mod agent;
pub mod knowledge_base;
pub mod knowledge_group;
