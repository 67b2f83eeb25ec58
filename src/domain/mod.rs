pub mod entities;
pub mod retry;
pub mod use_cases;
