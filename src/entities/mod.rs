pub mod company;
pub mod customer;
pub mod dispatch;
pub mod inventory_item;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod user;
