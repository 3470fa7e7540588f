//! Options subcommand
//!
//! List the options each operation accepts.

use clap::Parser;
use rastertiles::options::{Operation, describe};

use crate::{CommandResult, Completion};

#[derive(Parser, Debug)]
#[command(about = "List the options an operation accepts")]
pub struct Args {
    /// Operation to describe: write, warp, rasterize, tile or map-values [default: all]
    #[arg(value_name = "OPERATION")]
    operation: Option<Operation>,
}

pub fn run(args: &Args) -> CommandResult {
    let operations = match args.operation {
        Some(op) => vec![op],
        None => Operation::ALL.to_vec(),
    };

    for (i, op) in operations.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}:", op.name());
        for option in describe(op) {
            println!(
                "  {:<14} {:<12} default: {:<18} {}",
                option.name, option.kind, option.default, option.description
            );
        }
    }
    Ok(Completion::Complete)
}
