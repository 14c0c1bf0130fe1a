// Per-attempt cursor over a Buffer, and the draw primitives built on top of
// it. Every primitive documents how many bytes it consumes; running past the
// buffer's fill rejects the whole example.

use byteorder::{BigEndian, ByteOrder};

use crate::buffer::Buffer;
use crate::comms::Comms;

/// The exit code a forked child uses to signal an explicit test failure
/// (as opposed to a signal, a panic, or any other abnormal exit).
pub const TEST_FAILURE_EXIT_CODE: i32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoResult,
    DataRejected,
    TestFailed,
}

/// Bit pattern table `draw_double` indexes into when it decides to return a
/// "nasty" constant rather than an ordinary integer-plus-fraction value.
/// Order and values are load-bearing: shrinking walks the index down, and
/// index 0 (`0.0`) must be the tamest entry so a minimized nasty-double
/// failure degrades to an ordinary-looking number whenever possible.
const NASTY_DOUBLES: [f64; 16] = [
    0.0,
    0.5,
    1.0 / 3.0,
    10e6,
    10e-6,
    1.175_494_351e-38,
    2.225_073_858_507_201_4e-308,
    1.797_693_134_862_315_7e+308,
    3.402_823_466e+38,
    9_007_199_254_740_992.0,
    1.0 - 10e-6,
    1.0 + 10e-6,
    1.192_092_896e-07,
    2.220_446_049_250_313_1e-016,
    f64::INFINITY,
    f64::NAN,
];

/// Cursor into a Buffer used by a single test attempt. Borrows the buffer
/// (never owns it) and, when the attempt is running under fork isolation,
/// holds a handle to the cross-process rejection flag.
pub struct Context<'a> {
    buffer: &'a Buffer,
    current_index: usize,
    status: Status,
    comms: Option<&'a Comms>,
}

impl<'a> Context<'a> {
    pub fn new(buffer: &'a Buffer, comms: Option<&'a Comms>) -> Context<'a> {
        Context {
            buffer,
            current_index: 0,
            status: Status::NoResult,
            comms,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Reject the current example: no further bytes will be consumed
    /// meaningfully. Under fork isolation this terminates the child with
    /// success status immediately, since the parent distinguishes "rejected"
    /// from "failed" purely by whether the child exited cleanly.
    pub fn reject(&mut self) {
        self.status = Status::DataRejected;
        match self.comms {
            Some(comms) => {
                comms.signal_rejected();
                std::process::exit(0);
            }
            None => {
                log::warn!("rejected example when not running in a subprocess");
            }
        }
    }

    pub fn assume(&mut self, requirement: bool) {
        if !requirement {
            self.reject();
        }
    }

    /// Mark the example as a failure. Under fork isolation this terminates
    /// the child with the reserved failure exit code; in-process, it just
    /// records the status for the caller to observe after the routine
    /// returns, since there is no child to terminate.
    pub fn fail(&mut self) {
        self.status = Status::TestFailed;
        if self.comms.is_some() {
            std::process::exit(TEST_FAILURE_EXIT_CODE);
        }
    }

    /// Copies `dst.len()` bytes from the buffer into `dst`, rejecting the
    /// example if that would run past the buffer's fill. On rejection `dst`
    /// is zeroed so callers see deterministic content either way.
    pub fn draw_bytes(&mut self, dst: &mut [u8]) {
        let n = dst.len();
        if self.current_index + n > self.buffer.fill() {
            for b in dst.iter_mut() {
                *b = 0;
            }
            self.reject();
            return;
        }
        dst.copy_from_slice(&self.buffer.as_slice()[self.current_index..self.current_index + n]);
        self.current_index += n;
    }

    pub fn draw_uint8(&mut self) -> u8 {
        let mut b = [0u8; 1];
        self.draw_bytes(&mut b);
        b[0]
    }

    pub fn draw_bool(&mut self) -> bool {
        self.draw_uint8() & 1 == 1
    }

    /// Consumes 1 selector byte + 8 payload bytes (always 9, regardless of
    /// the drawn length) so every `draw_uint64` call has the same stride.
    pub fn draw_uint64(&mut self) -> u64 {
        let length = self.draw_uint8() & 7;
        let mut payload = [0u8; 8];
        self.draw_bytes(&mut payload);
        BigEndian::read_uint(&payload, length as usize + 1)
    }

    pub fn draw_small_uint64(&mut self) -> u64 {
        let mut result: u64 = 0;
        loop {
            let datum = self.draw_uint8();
            result += datum as u64;
            if datum < 0xff {
                return result;
            }
        }
    }

    fn saturate(mut x: u64) -> u64 {
        x |= x >> 1;
        x |= x >> 2;
        x |= x >> 4;
        x |= x >> 8;
        x |= x >> 16;
        x |= x >> 32;
        x
    }

    pub fn draw_uint64_under(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        let mask = Self::saturate(max);
        loop {
            let probe = mask & self.draw_uint64();
            if probe <= max {
                return probe;
            }
        }
    }

    pub fn draw_int64(&mut self) -> i64 {
        self.draw_uint64() as i64
    }

    pub fn draw_int64_between(&mut self, lower: i64, upper: i64) -> i64 {
        assert!(lower <= upper);
        if lower == upper {
            return lower;
        }
        if lower == i64::MIN && upper == i64::MAX {
            return self.draw_int64();
        }

        let minus_lower: u64 = if lower == i64::MIN {
            0x8000_0000_0000_0000
        } else {
            lower.wrapping_neg() as u64
        };

        let gap: u64 = if upper < 0 {
            upper.wrapping_sub(lower) as u64
        } else {
            (upper as u64).wrapping_add(minus_lower)
        };

        let probe = self.draw_uint64_under(gap);
        if probe >= minus_lower {
            (probe - minus_lower) as i64
        } else {
            ((minus_lower - probe) as i64).wrapping_neg()
        }
    }

    pub fn draw_fractional_double(&mut self) -> f64 {
        let a = self.draw_uint64();
        if a == 0 {
            return 0.0;
        }
        let b = self.draw_uint64_under(a);
        (b as f64) / (a as f64)
    }

    /// Draws a "branch" byte inverted from what was actually read, so that
    /// shrinking (which pushes bytes towards zero) pushes `branch` towards
    /// 255 and away from the nasty-double range `< 32`.
    pub fn draw_double(&mut self) -> f64 {
        let branch = 255 - self.draw_uint8();
        if branch < 32 {
            let base = NASTY_DOUBLES[(branch & 15) as usize];
            if branch & 16 != 0 {
                -base
            } else {
                base
            }
        } else {
            let integral = self.draw_int64();
            let fractional = self.draw_fractional_double();
            integral as f64 + fractional
        }
    }

    /// Draws a byte string that terminates early on an embedded zero byte
    /// (the zero itself is consumed but not included in the result), always
    /// bounded by a drawn maximum length.
    pub fn draw_string(&mut self) -> Vec<u8> {
        let max_length = self.draw_small_uint64() as usize;
        let mut data = Vec::with_capacity(max_length);
        for _ in 0..max_length {
            let c = self.draw_uint8();
            if c == 0 {
                return data;
            }
            data.push(c);
        }
        data
    }
}
