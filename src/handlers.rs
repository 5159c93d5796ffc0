pub mod audit;
pub mod auth;
pub mod inventory;
pub mod losses;
pub mod reports;
pub mod transactions;
