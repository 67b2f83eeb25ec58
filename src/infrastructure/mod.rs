pub mod db;
pub mod http;
pub mod notify;
pub mod utils;
