//! Arctic: client-side synchronized mirror of an agent server's state.

pub mod api;
pub mod binary;
pub mod client;
pub mod config;
mod dispatch;
pub mod error;
pub mod event;
pub mod http;
pub mod ipc;
pub mod model;
pub mod server;
pub mod store;
pub mod time;
pub mod work_time;

pub use api::ServerApi;
pub use client::{ChangeRx, SyncClient};
pub use dispatch::FollowUp;
pub use error::{Error, Result};
pub use event::Event;
pub use http::HttpApi;
pub use store::{Change, StoreStatus, SyncStore};
