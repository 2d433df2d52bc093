pub mod agents;
pub mod audit;
pub mod orders;
pub mod products;
pub mod roles;
pub mod users;
