// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport adapters: event bus (PUB/SUB) and request channel
//! (ROUTER/DEALER-style), both over Unix domain sockets with the shared
//! length-prefixed frame codec.

pub mod event_bus;
pub mod request_channel;
pub mod wire;

pub use event_bus::{publish, EventBusListener};
pub use request_channel::RequestChannel;
pub use wire::ProtocolError;
