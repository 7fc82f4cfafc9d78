pub mod cli;
pub mod client;
pub mod db;
pub mod gateway;
pub mod models;
pub mod util;
