pub mod db;
mod files;
mod folders;
pub mod models;
mod shares;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;
