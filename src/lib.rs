//! Lead intake — a menu-driven Telegram bot that collects service requests
//! and collaborator offers.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod flow;
pub mod presentation;
