//! Finds the smallest knapsack instance (at most 6 items, weights and
//! values in 1..=15, a small capacity) for which a greedy
//! value-density heuristic picks a worse total value than brute-force
//! search over all subsets.

use conjecture_core::{Context, RunConfig, RunOutcome};

const MAX_ITEMS: usize = 6;

fn main() {
    env_logger::init();

    let config = RunConfig {
        max_examples: 2_000,
        buffer_size: 256,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    };

    let outcome = conjecture_core::run_test(
        config,
        |ctx: &mut Context, _data: &()| {
            let count = (ctx.draw_uint8() % (MAX_ITEMS as u8 + 1)) as usize;
            let capacity = (ctx.draw_uint8() % 30) as u32;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let weight = 1 + (ctx.draw_uint8() % 15) as u32;
                let value = 1 + (ctx.draw_uint8() % 15) as u32;
                items.push((weight, value));
            }

            let greedy = greedy_value(&items, capacity);
            let optimal = optimal_value(&items, capacity);
            if greedy < optimal {
                ctx.fail();
            }
        },
        &(),
    );

    match outcome {
        Ok(RunOutcome::Passed { valid_examples }) => {
            println!("greedy matched the optimum across {valid_examples} examples");
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

/// Sorts by value-per-weight and takes items greedily while they fit.
fn greedy_value(items: &[(u32, u32)], capacity: u32) -> u32 {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let (wa, va) = items[a];
        let (wb, vb) = items[b];
        (vb as u64 * wa as u64).cmp(&(va as u64 * wb as u64))
    });

    let mut remaining = capacity;
    let mut total = 0;
    for i in order {
        let (weight, value) = items[i];
        if weight <= remaining {
            remaining -= weight;
            total += value;
        }
    }
    total
}

/// Exhaustive search over every subset; sound only for `items.len() <= 16`
/// or so, which the generator's `MAX_ITEMS` bound guarantees.
fn optimal_value(items: &[(u32, u32)], capacity: u32) -> u32 {
    let mut best = 0;
    for mask in 0u32..(1 << items.len()) {
        let mut weight = 0u32;
        let mut value = 0u32;
        for (i, &(w, v)) in items.iter().enumerate() {
            if mask & (1 << i) != 0 {
                weight += w;
                value += v;
            }
        }
        if weight <= capacity {
            best = best.max(value);
        }
    }
    best
}
