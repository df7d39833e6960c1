// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

#[cfg(feature = "grpc_impl")]
pub mod grpc_impl;
pub mod invocation;
pub mod util;
