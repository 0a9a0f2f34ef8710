pub mod cart;
pub mod health;
pub mod history;
pub mod metrics;
pub mod stock;
