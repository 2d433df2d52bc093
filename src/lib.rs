pub mod access;
pub mod audit;
pub mod calendar;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod dto;
pub mod entity;
pub mod error;
pub mod import;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod order_code;
pub mod phone;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod workflow;
