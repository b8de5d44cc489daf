pub mod access;
pub mod catalog;
pub mod config;
pub mod db;
pub mod extract;
pub mod flow;
pub mod handlers;
pub mod model;
pub mod session;
