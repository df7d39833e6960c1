// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "grpc_impl")]
    {
        tonic_build::compile_protos("proto/runtime.proto")?;
    }
    Ok(())
}
