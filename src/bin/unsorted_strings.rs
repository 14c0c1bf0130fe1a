//! Finds the smallest list of byte strings that is not already sorted.

use conjecture_core::{Context, RunConfig, RunOutcome, VariableDraw};

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
            let mut draw: VariableDraw<Vec<u8>> = VariableDraw::start(ctx);
            while draw.advance() {
                let s = draw.target().draw_string();
                draw.push(s);
            }
            let strings = draw.complete();
            if strings.windows(2).any(|w| w[0] > w[1]) {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("every generated list was sorted across {valid_examples} examples");
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
