// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod cancel;
mod data_contract;
pub mod helpers;
mod provider;
mod revert;
mod submitter;
mod subscriber;
mod types;

pub use cancel::*;
pub use data_contract::*;
pub use helpers::*;
pub use provider::*;
pub use revert::*;
pub use submitter::*;
pub use subscriber::*;
pub use types::*;
