//! Finds three doubles for which floating-point addition is not
//! associative, i.e. `(a + b) + c != a + (b + c)`.

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
            let a = ctx.draw_double();
            let b = ctx.draw_double();
            let c = ctx.draw_double();
            if !a.is_finite() || !b.is_finite() || !c.is_finite() {
                ctx.assume(false);
                return;
            }
            let left = (a + b) + c;
            let right = a + (b + c);
            if left != right {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("addition held associative across {valid_examples} examples");
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
