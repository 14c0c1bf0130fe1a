//! Finds the smallest list of `u8`s whose total exceeds a fixed bound.

use conjecture_core::{Context, RunConfig, RunOutcome, VariableDraw};

const BOUND: u64 = 1_000;

fn main() {
    env_logger::init();

    let config = RunConfig {
        max_examples: 1_000,
        buffer_size: 4 * 1024,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    };

    let outcome = conjecture_core::run_test(
        config,
        |ctx: &mut Context, _data: &()| {
            let mut draw: VariableDraw<u64> = VariableDraw::start(ctx);
            let mut total: u64 = 0;
            while draw.advance() {
                let value = draw.target().draw_uint8() as u64;
                draw.push(value);
                total += value;
            }
            draw.complete();
            if total > BOUND {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("sum stayed within {BOUND} across {valid_examples} examples");
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
