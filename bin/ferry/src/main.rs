#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use clap::Parser;

pub(crate) mod batch;
pub(crate) mod blob;
pub(crate) mod cli;
pub(crate) mod decode;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().init_telemetry()?.run()
}
