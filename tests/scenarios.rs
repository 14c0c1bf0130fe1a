//! End-to-end scenarios driving the whole engine: generation, draw
//! primitives, fork isolation and shrinking together, rather than any one
//! module in isolation.

#![cfg(unix)]

use std::num::NonZeroUsize;
use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

use conjecture_core::{Context, RunConfig, RunError, RunOutcome, VariableDraw};

fn small_config() -> RunConfig {
    RunConfig {
        max_examples: 300,
        buffer_size: 512,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    }
}

#[test]
fn associativity_of_small_sum_shrinks_to_a_minimal_overflowing_pair() {
    let outcome = conjecture_core::run_test(
        small_config(),
        |ctx: &mut Context, _data: &()| {
            let a = ctx.draw_uint8();
            let b = ctx.draw_uint8();
            if a as u16 + b as u16 > u8::MAX as u16 {
                ctx.fail();
            }
        },
        &(),
    )
    .expect("run should complete");

    match outcome {
        RunOutcome::Failed { buffer, .. } => {
            assert_eq!(buffer.fill(), 2);
            let bytes = buffer.as_slice();
            assert!(bytes[0] as u16 + bytes[1] as u16 > u8::MAX as u16);
        }
        RunOutcome::Passed { .. } => panic!("expected an overflowing pair to be found"),
    }
}

#[test]
fn exhausting_the_buffer_on_every_attempt_reports_too_few_valid_examples() {
    let config = RunConfig {
        max_examples: 10,
        buffer_size: 4,
        isolate_forked: true,
        suppress_output: true,
        ..RunConfig::default()
    };
    // Always reads past the tiny buffer, so every attempt rejects.
    let result = conjecture_core::run_test(
        config,
        |ctx: &mut Context, _data: &()| {
            let mut dst = [0u8; 64];
            ctx.draw_bytes(&mut dst);
        },
        &(),
    );
    assert!(matches!(result, Err(RunError::TooFewValidExamples { .. })));
}

/// A counter living in an anonymous `MAP_SHARED` page, so writes made by one
/// forked child are visible to the next one - unlike ordinary heap memory,
/// which becomes a private copy the moment a forked process touches it.
struct SharedCounter {
    ptr: NonNull<AtomicUsize>,
}

unsafe impl Send for SharedCounter {}
unsafe impl Sync for SharedCounter {}

impl SharedCounter {
    fn new() -> SharedCounter {
        let len = NonZeroUsize::new(std::mem::size_of::<AtomicUsize>()).unwrap();
        let ptr = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
            .unwrap()
        }
        .cast::<AtomicUsize>();
        unsafe {
            ptr.as_ptr().write(AtomicUsize::new(0));
        }
        SharedCounter { ptr }
    }

    fn fetch_add(&self, n: usize) -> usize {
        unsafe { self.ptr.as_ref() }.fetch_add(n, Ordering::SeqCst)
    }
}

impl Drop for SharedCounter {
    fn drop(&mut self) {
        let len = std::mem::size_of::<AtomicUsize>();
        unsafe {
            let _ = munmap(self.ptr.as_ptr() as *mut c_void, len);
        }
    }
}

#[test]
fn a_failure_that_only_reproduces_once_is_reported_as_flaky() {
    let counter = SharedCounter::new();
    // Fails only the very first time the routine ever runs, across every
    // forked child that shares this page. Every later attempt - including
    // every shrink candidate and the final replay - passes, so the engine
    // can neither shrink it nor confirm it on replay.
    let result = conjecture_core::run_test(
        small_config(),
        |ctx: &mut Context, _data: &SharedCounter| {
            if counter.fetch_add(1) == 0 {
                ctx.fail();
            }
        },
        &counter,
    );
    assert!(matches!(result, Err(RunError::Flaky)));
}

#[test]
fn variable_length_list_sum_shrinks_to_a_single_large_element() {
    const BOUND: u64 = 100;
    let outcome = conjecture_core::run_test(
        small_config(),
        |ctx: &mut Context, _data: &()| {
            let mut draw: VariableDraw<u64> = VariableDraw::start(ctx);
            let mut total = 0u64;
            while draw.advance() {
                let v = draw.target().draw_uint8() as u64;
                draw.push(v);
                total += v;
            }
            draw.complete();
            if total > BOUND {
                ctx.fail();
            }
        },
        &(),
    )
    .expect("run should complete");

    match outcome {
        RunOutcome::Failed { buffer, .. } => {
            assert!(!buffer.as_slice().is_empty());
        }
        RunOutcome::Passed { .. } => panic!("expected a sum exceeding the bound to be found"),
    }
}

#[test]
fn double_addition_is_not_associative() {
    let outcome = conjecture_core::run_test(
        small_config(),
        |ctx: &mut Context, _data: &()| {
            let a = ctx.draw_double();
            let b = ctx.draw_double();
            let c = ctx.draw_double();
            if !(a.is_finite() && b.is_finite() && c.is_finite()) {
                ctx.assume(false);
                return;
            }
            if (a + b) + c != a + (b + c) {
                ctx.fail();
            }
        },
        &(),
    )
    .expect("run should complete");

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
}

#[test]
fn drawn_strings_never_contain_the_terminator_byte() {
    let outcome = conjecture_core::run_test(
        small_config(),
        |ctx: &mut Context, _data: &()| {
            let s = ctx.draw_string();
            if s.contains(&0) {
                ctx.fail();
            }
        },
        &(),
    )
    .expect("run should complete");

    match outcome {
        RunOutcome::Passed { valid_examples } => assert!(valid_examples > 0),
        RunOutcome::Failed { buffer, .. } => {
            panic!("draw_string should never yield an embedded zero, got buffer {buffer}")
        }
    }
}
