//! Luigi's
//!
//! Cart, checkout and address capture for a restaurant's chat-driven ordering
//! pages. Customers arrive from a WhatsApp conversation carrying a session
//! token; they build a cart from the menu and the order is handed back to the
//! conversation workflow.

pub mod address;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod display;
pub mod manager;
pub mod menu;
pub mod notifications;
pub mod observability;
pub mod pricing;
pub mod promos;
pub mod selection;
pub mod session;
pub mod transport;
