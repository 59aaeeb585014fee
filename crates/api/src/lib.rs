//! HTTP surface for OrderRelay.
//!
//! Endpoints:
//! - GET  /health
//! - POST /shops/{shop_id}/telegram/connect — register or replace the bot integration
//! - GET  /shops/{shop_id}/telegram/status  — integration state + 7-day delivery counters
//! - POST /shops/{shop_id}/orders           — create an order, dispatch its notification
//! - GET  /shops/{shop_id}/orders           — paginated order list with send status

pub mod extract;
pub mod routes;
pub mod state;
