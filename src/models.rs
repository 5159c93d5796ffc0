pub mod audit;
pub mod auth;
pub mod inventory;
pub mod loss;
pub mod report;
pub mod transaction;
