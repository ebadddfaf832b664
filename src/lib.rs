pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod lines;
pub mod model;
pub mod rpc;
pub mod services;
pub mod util;
