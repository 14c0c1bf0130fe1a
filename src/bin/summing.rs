//! Finds the smallest pair of `u8`s whose sum overflows a `u8`.

use conjecture_core::{Context, RunConfig, RunOutcome};

fn main() {
    env_logger::init();

    let config = RunConfig {
        max_examples: 1_000,
        buffer_size: 256,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    };

    let outcome = conjecture_core::run_test(
        config,
        |ctx: &mut Context, _data: &()| {
            let a = ctx.draw_uint8();
            let b = ctx.draw_uint8();
            let sum = a as u16 + b as u16;
            if sum > u8::MAX as u16 {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("no overflowing pair found in {valid_examples} examples");
        }
        Ok(RunOutcome::Failed { buffer, failure }) => {
            println!("found a failure ({failure:?}) with buffer {buffer}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("run failed: {err}");
            std::process::exit(2);
        }
    }
}
