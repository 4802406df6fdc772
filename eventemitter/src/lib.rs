#![doc = include_str!("../README.md")]

pub mod error;
pub mod eventemitter;

pub use eventemitter::{BoxError, EventEmitter, Listener, ListenerResult};

pub use error::{Error, Result};
