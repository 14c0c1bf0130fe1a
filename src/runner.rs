// Top-level driver: generates random buffers, counts valid examples, and on
// the first failure hands the buffer to the shrinker before replaying the
// minimized result once, unsuppressed and without isolation, to rule out
// flakiness and let the user see the test's own output.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::buffer::Buffer;
use crate::comms::Comms;
use crate::context::Context;
use crate::error::RunError;
use crate::executor::{default_forker, run_attempt, FailureKind, Forker, Isolation};
use crate::shrink::shrink;

/// Tunables for a single run. `buffer_size` bounds how much randomness is
/// made available to a single attempt - a test that overruns it gets
/// rejected, never a panic.
#[derive(Clone)]
pub struct RunConfig {
    pub max_examples: usize,
    pub buffer_size: usize,
    /// Run each attempt in a forked child. Disabling this is only sound on
    /// platforms without `fork`, or when the caller already trusts the test
    /// routine not to crash the process.
    pub isolate_forked: bool,
    pub suppress_output: bool,
    /// The process-spawn primitive used when `isolate_forked` is set, matching
    /// the original's caller-supplied `fork`/`fork_data` pair. Defaults to the
    /// OS `fork()` syscall; substitute this to run attempts under a test
    /// harness's own process-spawn shim instead.
    pub forker: Arc<Forker>,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_examples", &self.max_examples)
            .field("buffer_size", &self.buffer_size)
            .field("isolate_forked", &self.isolate_forked)
            .field("suppress_output", &self.suppress_output)
            .field("forker", &"<fn>")
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            max_examples: 200,
            buffer_size: 65536,
            isolate_forked: true,
            suppress_output: true,
            forker: default_forker(),
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Passed {
        valid_examples: usize,
    },
    Failed {
        buffer: Buffer,
        failure: FailureKind,
    },
}

pub struct Runner<F, D> {
    config: RunConfig,
    test_case: F,
    _data: PhantomData<D>,
}

impl<F, D> Runner<F, D>
where
    F: Fn(&mut Context, &D),
{
    pub fn new(config: RunConfig, test_case: F) -> Self {
        Runner {
            config,
            test_case,
            _data: PhantomData,
        }
    }

    /// Runs the generation loop against `data`, returning as soon as either
    /// enough valid examples have been seen or a failure has been found and
    /// shrunk.
    ///
    /// The fill handed to each attempt starts small (64 bytes, or the whole
    /// capacity if that is smaller) and doubles every time an attempt
    /// rejects, up to the configured capacity - most tests need far less
    /// than a full buffer, and starting small means a test that rejects
    /// because it overran gets more room next time instead of the same
    /// amount forever.
    pub fn run(&self, data: &D) -> Result<RunOutcome, RunError> {
        let comms = if self.config.isolate_forked {
            Some(Comms::new().map_err(RunError::SharedMemory)?)
        } else {
            None
        };

        let mut rng = OsRng;
        let mut fill = self.config.buffer_size.min(64);
        let call_budget = self.config.max_examples.saturating_mul(5);
        let mut accepted = 0usize;
        let mut calls = 0usize;

        loop {
            if accepted >= self.config.max_examples {
                info!("passed after {accepted} valid examples");
                return Ok(RunOutcome::Passed {
                    valid_examples: accepted,
                });
            }
            if calls >= call_budget {
                return self.too_few_or_passed(accepted, calls);
            }
            calls += 1;

            let mut buffer = Buffer::new(self.config.buffer_size);
            rng.try_fill_bytes(&mut buffer.storage_mut()[..fill])
                .map_err(RunError::Randomness)?;
            buffer.set_fill(fill);

            let isolation = match &comms {
                Some(comms) => Isolation::Forked(comms, self.config.forker.as_ref()),
                None => Isolation::InProcess,
            };
            let failure = run_attempt(
                &buffer,
                &isolation,
                self.config.suppress_output,
                &self.test_case,
                data,
            )?;
            let rejected = comms.as_ref().is_some_and(Comms::rejected);

            if let Some(failure_kind) = failure {
                return self.shrink_and_report(buffer, failure_kind, data);
            }
            if rejected {
                debug!("rejected call {calls} ({accepted} accepted so far)");
                fill = (fill * 2).min(self.config.buffer_size);
            } else {
                accepted += 1;
            }
        }
    }

    /// Applied once the call budget is exhausted without reaching the
    /// example quota: too many rejections relative to calls is reported as
    /// `TooFewValidExamples`, matching the "fewer than 10% accepted" bar.
    fn too_few_or_passed(&self, accepted: usize, calls: usize) -> Result<RunOutcome, RunError> {
        if accepted * 10 < calls {
            Err(RunError::TooFewValidExamples {
                valid: accepted,
                required: self.config.max_examples,
                attempts: calls,
            })
        } else {
            Ok(RunOutcome::Passed {
                valid_examples: accepted,
            })
        }
    }

    fn shrink_and_report(
        &self,
        buffer: Buffer,
        failure_kind: FailureKind,
        data: &D,
    ) -> Result<RunOutcome, RunError> {
        info!("found a failing example ({failure_kind:?}), shrinking");
        let comms = if self.config.isolate_forked {
            Some(Comms::new().map_err(RunError::SharedMemory)?)
        } else {
            None
        };
        let test_case = &self.test_case;
        let suppress_output = self.config.suppress_output;
        let forker = self.config.forker.as_ref();
        let mut spawn_error = None;
        let minimized = shrink(&buffer, |candidate| {
            let isolation = match &comms {
                Some(comms) => Isolation::Forked(comms, forker),
                None => Isolation::InProcess,
            };
            match run_attempt(candidate, &isolation, suppress_output, test_case, data) {
                Ok(outcome) => outcome.is_some(),
                Err(err) => {
                    // A fatal operational failure (fork/wait/fd redirection)
                    // is not "not interesting" - it means shrinking cannot
                    // continue at all. Remember it and stop committing any
                    // further shrinks; the outer call below surfaces it.
                    spawn_error.get_or_insert(err);
                    false
                }
            }
        });
        if let Some(err) = spawn_error {
            return Err(RunError::from(err));
        }

        match run_attempt(&minimized, &Isolation::InProcess, false, test_case, data)? {
            Some(kind) => Ok(RunOutcome::Failed {
                buffer: minimized,
                failure: kind,
            }),
            None => {
                warn!("minimized example did not reproduce on unsuppressed replay");
                Err(RunError::Flaky)
            }
        }
    }
}

/// Runs a fresh `Runner` against `config` and `data` in one call. Most
/// callers only ever need this.
pub fn run_test<F, D>(config: RunConfig, test_case: F, data: &D) -> Result<RunOutcome, RunError>
where
    F: Fn(&mut Context, &D),
{
    Runner::new(config, test_case).run(data)
}

/// Re-runs `test_case` against one already-known buffer, without generation
/// or shrinking. Used to replay a saved counterexample.
pub fn run_test_for_buffer<F, D>(
    config: &RunConfig,
    test_case: &F,
    data: &D,
    buffer: &Buffer,
) -> Result<Option<FailureKind>, RunError>
where
    F: Fn(&mut Context, &D),
{
    let comms = if config.isolate_forked {
        Some(Comms::new().map_err(RunError::SharedMemory)?)
    } else {
        None
    };
    let isolation = match &comms {
        Some(comms) => Isolation::Forked(comms, config.forker.as_ref()),
        None => Isolation::InProcess,
    };
    Ok(run_attempt(
        buffer,
        &isolation,
        config.suppress_output,
        test_case,
        data,
    )?)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn passes_when_the_test_never_fails() {
        let config = RunConfig {
            max_examples: 20,
            buffer_size: 16,
            isolate_forked: true,
            suppress_output: true,
            ..RunConfig::default()
        };
        let outcome = run_test(config, |_ctx: &mut Context, _data: &()| {}, &()).unwrap();
        match outcome {
            RunOutcome::Passed { valid_examples } => assert_eq!(valid_examples, 20),
            RunOutcome::Failed { .. } => panic!("test should not have failed"),
        }
    }

    #[test]
    fn finds_and_shrinks_a_single_byte_failure() {
        let config = RunConfig {
            max_examples: 50,
            buffer_size: 16,
            isolate_forked: true,
            suppress_output: true,
            ..RunConfig::default()
        };
        let outcome = run_test(
            config,
            |ctx: &mut Context, _data: &()| {
                if ctx.draw_uint8() >= 5 {
                    ctx.fail();
                }
            },
            &(),
        )
        .unwrap();
        match outcome {
            RunOutcome::Failed { buffer, failure } => {
                assert_eq!(failure, FailureKind::Explicit);
                assert_eq!(buffer.as_slice(), &[5]);
            }
            RunOutcome::Passed { .. } => panic!("expected the run to find a failure"),
        }
    }

    #[test]
    fn rejecting_every_attempt_reports_too_few_valid_examples() {
        let config = RunConfig {
            max_examples: 5,
            buffer_size: 8,
            isolate_forked: true,
            suppress_output: true,
            ..RunConfig::default()
        };
        let result = run_test(
            config,
            |ctx: &mut Context, _data: &()| ctx.assume(false),
            &(),
        );
        assert!(matches!(result, Err(RunError::TooFewValidExamples { .. })));
    }

    #[test]
    fn run_test_for_buffer_replays_a_known_buffer() {
        let config = RunConfig::default();
        let mut buffer = Buffer::new(4);
        buffer.storage_mut()[0] = 9;
        buffer.set_fill(1);

        let failure = run_test_for_buffer(
            &config,
            &|ctx: &mut Context, _data: &()| {
                if ctx.draw_uint8() >= 5 {
                    ctx.fail();
                }
            },
            &(),
            &buffer,
        )
        .unwrap();
        assert_eq!(failure, Some(FailureKind::Explicit));
    }
}
