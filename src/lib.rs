// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod backend;
pub mod config;
pub mod host;

mod error;

pub use backend::probe::{probe, Factory};
pub use backend::{Backend, Policy, State, RECLAIM_PROPERTY};
pub use error::Error;
