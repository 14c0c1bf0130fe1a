//! Deliberately flaky: the failure condition depends on the forked child's
//! process id, so a buffer that fails during the search almost never fails
//! again on the final unsuppressed, non-isolated replay. Demonstrates the
//! engine reporting `RunError::Flaky` rather than silently accepting an
//! unreproducible result.

use conjecture_core::{Context, RunConfig, RunOutcome};

fn main() {
    env_logger::init();

    let config = RunConfig {
        max_examples: 1_000,
        buffer_size: 64,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    };

    let outcome = conjecture_core::run_test(
        config,
        |ctx: &mut Context, _data: &()| {
            let pick = ctx.draw_uint8() % 7;
            let pid_bucket = (std::process::id() % 7) as u8;
            if pick == pid_bucket {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("no failure found across {valid_examples} examples");
        }
        Ok(RunOutcome::Failed { buffer, failure }) => {
            println!("found a reproducible failure ({failure:?}) with buffer {buffer}");
            std::process::exit(1);
        }
        Err(err) => {
            println!("run reported: {err}");
            std::process::exit(3);
        }
    }
}
