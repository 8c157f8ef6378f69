//! Alarm Daemon - arm/disarm state owner and notification relay
//!
//! This crate provides the core infrastructure for the alarm daemon:
//! - `state` - Alarm state machine actor (single writer, durable)
//! - `server` - Unix socket server for `alarm-ctl` requests
//! - `collector` - Batches alarm events from the panel interface
//! - `notify` - Dispatches batches to notification channels
//! - `config` - Typed daemon configuration loaded at startup
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         alarmd                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────────┐  StateCommand   ┌───────────────────┐   │
//! │  │  DaemonServer   │────────────────▶│   StateActor      │   │
//! │  │ (Unix Socket)   │  (mpsc/oneshot) │ (AlarmState owner)│   │
//! │  └─────────────────┘                 └─────────┬─────────┘   │
//! │                                                │ save         │
//! │                                                ▼              │
//! │                                       ┌───────────────────┐  │
//! │                                       │    StateStore     │  │
//! │                                       └───────────────────┘  │
//! │                                                              │
//! │  ┌─────────────────┐   EventBatch    ┌───────────────────┐   │
//! │  │ EventCollector  │────────────────▶│    Dispatcher     │   │
//! │  │ (size / window) │  (bounded queue)│  (worker pool)    │   │
//! │  └─────────────────┘                 └─────────┬─────────┘   │
//! │                                                │ per channel  │
//! │                                                ▼              │
//! │                                   Email / Log channels        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The control path and the notification path share nothing but the
//! read-only configuration.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod collector;
pub mod config;
pub mod notify;
pub mod server;
pub mod state;
