use anyhow::anyhow;
use clap::Command;
use clap_complete::Shell;
use std::fmt::Display;
use std::io;

pub mod compare;
pub mod keyboard;
pub mod normalize;
pub mod notes;
pub mod ratio;
pub mod system;
pub mod test_helpers;

/// Conversion factor between natural logarithms and cents (Ellis): 1200 / ln 2.
pub const ELLIS_FACTOR: f64 = 1200.0 / std::f64::consts::LN_2;

pub fn to_anyhow<E: Display>(e: E) -> anyhow::Error {
    anyhow!("{e}")
}

pub fn cli_completions(shell: Shell, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, cmd, name, &mut io::stdout());
}

pub fn cents_to_ratio(cents: f64) -> f64 {
    (cents / ELLIS_FACTOR).exp()
}

pub fn ratio_to_cents(ratio: f64) -> f64 {
    ratio.ln() * ELLIS_FACTOR
}
