//! Sample business routes.

pub mod echo;
pub mod usersgroups;
