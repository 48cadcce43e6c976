pub mod customers;
pub mod dispatches;
pub mod inventory;
pub mod order_status;
pub mod orders;
pub mod reports;
