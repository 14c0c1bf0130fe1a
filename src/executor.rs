// Runs one test attempt and reports whether it failed. When isolated, the
// attempt happens in a forked child so an abort, a signal, or plain memory
// corruption inside the user's routine can be observed as a failure without
// taking the driver down with it.

use std::os::unix::io::RawFd;
use std::sync::Arc;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup, dup2, fork, ForkResult};

use crate::buffer::Buffer;
use crate::comms::Comms;
use crate::context::{Context, Status, TEST_FAILURE_EXIT_CODE};

const STDOUT_FD: RawFd = 1;
const STDERR_FD: RawFd = 2;

/// How a failing attempt failed, distinguishing a test that called
/// `Context::fail()` on purpose from one that crashed, panicked, or was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Explicit,
    Uncontrolled,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("unable to fork child process: {0}")]
    Fork(#[source] nix::Error),
    #[error("unable to wait for child process: {0}")]
    Wait(#[source] nix::Error),
    #[error("unable to redirect standard output to /dev/null: {0}")]
    Suppress(#[source] nix::Error),
}

/// A caller-substitutable process-spawn primitive, matching the original's
/// `runner->fork`/`fork_data` pair. Defaults to the OS `fork()` syscall; see
/// `default_forker`.
pub type Forker = dyn Fn() -> nix::Result<ForkResult> + Send + Sync;

/// The default forker: the OS `fork()` syscall, nothing else.
pub fn default_forker() -> Arc<Forker> {
    Arc::new(|| unsafe { fork() })
}

/// Where a single attempt should run.
pub enum Isolation<'a> {
    /// Fork a child (via the given forker) and run the attempt there,
    /// reaping it afterwards. `Comms` is how the child tells the parent "I
    /// rejected" before exiting 0.
    Forked(&'a Comms, &'a Forker),
    /// Run the attempt in the current process. Used for the final,
    /// unsuppressed replay of a minimized failing buffer - there is no
    /// child left to reap by that point, and a failing routine there is
    /// expected to bring the whole process down.
    InProcess,
}

/// Runs `test_case` once against `buffer` and reports how (if at all) the
/// attempt failed. Rejection is not failure: callers using
/// `Isolation::Forked` should check `comms.rejected()` afterwards to tell a
/// rejected attempt apart from a merely accepted one.
pub fn run_attempt<F, D>(
    buffer: &Buffer,
    isolation: &Isolation,
    suppress_output: bool,
    test_case: &F,
    data: &D,
) -> Result<Option<FailureKind>, ExecutorError>
where
    F: Fn(&mut Context, &D),
{
    match isolation {
        Isolation::Forked(comms, forker) => {
            run_forked(buffer, comms, forker, suppress_output, test_case, data)
        }
        Isolation::InProcess => Ok(run_in_process(buffer, suppress_output, test_case, data)),
    }
}

fn run_forked<F, D>(
    buffer: &Buffer,
    comms: &Comms,
    forker: &Forker,
    suppress_output: bool,
    test_case: &F,
    data: &D,
) -> Result<Option<FailureKind>, ExecutorError>
where
    F: Fn(&mut Context, &D),
{
    comms.clear();
    match forker().map_err(ExecutorError::Fork)? {
        ForkResult::Child => {
            if suppress_output {
                // Best-effort: if this fails there is nothing sensible left
                // to do but run with output still attached.
                let _ = suppress_std_fds();
            }
            let mut context = Context::new(buffer, Some(comms));
            test_case(&mut context, data);
            std::process::exit(0);
        }
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).map_err(ExecutorError::Wait)?;
            Ok(classify(&status))
        }
    }
}

fn classify(status: &WaitStatus) -> Option<FailureKind> {
    match status {
        WaitStatus::Exited(_, 0) => None,
        WaitStatus::Exited(_, code) if *code == TEST_FAILURE_EXIT_CODE => {
            Some(FailureKind::Explicit)
        }
        // Any other exit code, a signal, or a status we did not expect from
        // a plain `exit`: all of these count as an uncontrolled failure.
        _ => Some(FailureKind::Uncontrolled),
    }
}

fn run_in_process<F, D>(
    buffer: &Buffer,
    suppress_output: bool,
    test_case: &F,
    data: &D,
) -> Option<FailureKind>
where
    F: Fn(&mut Context, &D),
{
    let saved_fds = if suppress_output {
        mute_std_fds().ok()
    } else {
        None
    };

    let mut context = Context::new(buffer, None);
    test_case(&mut context, data);
    let failed = context.status() == Status::TestFailed;

    if let Some(saved) = saved_fds {
        restore_std_fds(saved);
    }

    if failed {
        Some(FailureKind::Explicit)
    } else {
        None
    }
}

fn open_devnull() -> Result<RawFd, ExecutorError> {
    open("/dev/null", OFlag::O_WRONLY, Mode::empty()).map_err(ExecutorError::Suppress)
}

/// Redirects stdout/stderr to /dev/null in the current process. Used in the
/// forked child, which simply exits afterwards so the descriptors never
/// need to be restored.
fn suppress_std_fds() -> Result<(), ExecutorError> {
    let devnull = open_devnull()?;
    dup2(devnull, STDOUT_FD).map_err(ExecutorError::Suppress)?;
    dup2(devnull, STDERR_FD).map_err(ExecutorError::Suppress)?;
    let _ = close(devnull);
    Ok(())
}

/// Like `suppress_std_fds`, but first saves the real descriptors so the
/// in-process executor can put them back: there is no child process here
/// to simply discard once the attempt is over.
fn mute_std_fds() -> Result<(RawFd, RawFd), ExecutorError> {
    let saved_out = dup(STDOUT_FD).map_err(ExecutorError::Suppress)?;
    let saved_err = dup(STDERR_FD).map_err(ExecutorError::Suppress)?;
    let devnull = open_devnull()?;
    dup2(devnull, STDOUT_FD).map_err(ExecutorError::Suppress)?;
    dup2(devnull, STDERR_FD).map_err(ExecutorError::Suppress)?;
    let _ = close(devnull);
    Ok((saved_out, saved_err))
}

fn restore_std_fds(saved: (RawFd, RawFd)) {
    let (saved_out, saved_err) = saved;
    let _ = dup2(saved_out, STDOUT_FD);
    let _ = dup2(saved_err, STDERR_FD);
    let _ = close(saved_out);
    let _ = close(saved_err);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn accepted_attempt_is_not_failing() {
        let buf = Buffer::new(8);
        let comms = Comms::new().unwrap();
        let outcome = run_attempt(
            &buf,
            &Isolation::Forked(&comms, &default_forker()),
            true,
            &|_ctx: &mut Context, _data: &()| {},
            &(),
        )
        .unwrap();
        assert_eq!(outcome, None);
        assert!(!comms.rejected());
    }

    #[test]
    fn rejecting_attempt_is_not_failing_but_sets_comms() {
        let buf = Buffer::new(8);
        let comms = Comms::new().unwrap();
        let outcome = run_attempt(
            &buf,
            &Isolation::Forked(&comms, &default_forker()),
            true,
            &|ctx: &mut Context, _data: &()| ctx.reject(),
            &(),
        )
        .unwrap();
        assert_eq!(outcome, None);
        assert!(comms.rejected());
    }

    #[test]
    fn fail_is_reported_as_explicit_failure() {
        let buf = Buffer::new(8);
        let comms = Comms::new().unwrap();
        let outcome = run_attempt(
            &buf,
            &Isolation::Forked(&comms, &default_forker()),
            true,
            &|ctx: &mut Context, _data: &()| ctx.fail(),
            &(),
        )
        .unwrap();
        assert_eq!(outcome, Some(FailureKind::Explicit));
        assert!(!comms.rejected());
    }

    #[test]
    fn panic_in_child_is_reported_as_uncontrolled_failure() {
        let buf = Buffer::new(8);
        let comms = Comms::new().unwrap();
        let outcome = run_attempt(
            &buf,
            &Isolation::Forked(&comms, &default_forker()),
            true,
            &|_ctx: &mut Context, _data: &()| panic!("boom"),
            &(),
        )
        .unwrap();
        assert_eq!(outcome, Some(FailureKind::Uncontrolled));
    }

    #[test]
    fn in_process_failure_is_observed_via_status() {
        let buf = Buffer::new(8);
        let outcome = run_attempt(
            &buf,
            &Isolation::InProcess,
            true,
            &|ctx: &mut Context, _data: &()| ctx.fail(),
            &(),
        )
        .unwrap();
        assert_eq!(outcome, Some(FailureKind::Explicit));
    }
}
