// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use clap::Parser;

#[derive(Debug, clap::Parser)]
#[command(long_about = None)]
struct Args {
    /// Path of the TOML configuration, or an inline JSON document.
    #[arg(short, long, default_value_t = String::from("etc/fnhost/service.toml"))]
    config_file: String,
    #[arg(short, long, default_value_t = String::from(""))]
    template: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Create a template configuration and exit.
    if !args.template.is_empty() {
        fnhost_api::util::create_template(&args.template, fnhost_runtime::fnhost_runtime_default_conf().as_str())?;
        return Ok(());
    }

    let settings = fnhost_runtime::settings::load_settings(&args.config_file)?;
    fnhost_runtime::logging::init_logger(&settings.name, &settings.logger)?;

    let async_runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    async_runtime.block_on(fnhost_runtime::fnhost_runtime_main(settings))
}
