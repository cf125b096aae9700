//! CLI argument parsing, mirroring the teacher binary's `-c <config>` plus
//! override-flag shape (`bin/strata/src/args.rs`).

use std::path::PathBuf;

use argh::FromArgs;

/// Qubic explorer ingestion-and-analytics core.
#[derive(Clone, Debug, FromArgs)]
pub struct Args {
    /// path to the TOML configuration file
    #[argh(option, short = 'c')]
    pub config: PathBuf,

    /// dotted-path config override, `key.path=value` (repeatable)
    #[argh(option)]
    pub set: Vec<String>,
}
