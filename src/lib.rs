pub mod clock;
pub mod config;
pub mod fetch;
pub mod humanize;
pub mod item;
pub mod ledger;
pub mod limiter;
pub mod observability;
pub mod orchestrator;
pub mod retry;
pub mod universe;

pub use item::ItemId;
