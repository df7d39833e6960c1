// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

pub mod api {
    tonic::include_proto!("runtime");
}
pub mod runtime;
pub mod tls_config;
