// Draws an unknown-in-advance number of fixed-shape values, encoded so that
// shrinking the underlying buffer shortens the resulting sequence rather
// than just zeroing its elements.
//
// Encoding: draw `full_length` (small_uint64, heavily biased to small), then
// if nonzero a `threshold` byte; then before each element, draw one byte and
// continue only if it is >= threshold. Both the length bias and the
// threshold comparison push shrinking towards shorter sequences - do not
// replace this with a plain "draw a length, then loop" encoding, it shrinks
// worse.

use crate::context::Context;

pub struct VariableDraw<'ctx, 'buf, T> {
    context: &'ctx mut Context<'buf>,
    full_length: usize,
    threshold: u8,
    attempts: usize,
    write_index: usize,
    done: bool,
    data: Vec<T>,
}

impl<'ctx, 'buf, T> VariableDraw<'ctx, 'buf, T> {
    pub fn start(context: &'ctx mut Context<'buf>) -> Self {
        let full_length = context.draw_small_uint64() as usize;
        let threshold = if full_length > 0 {
            context.draw_uint8()
        } else {
            0
        };
        VariableDraw {
            context,
            full_length,
            threshold,
            attempts: 0,
            write_index: 0,
            done: false,
            data: Vec::with_capacity(full_length),
        }
    }

    /// Returns true if there is another element to draw, having already
    /// decided so by consuming one continuation byte. `target` should be
    /// called (to draw the value) only when this returns true.
    pub fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        if self.attempts >= self.full_length {
            self.done = true;
            return false;
        }
        self.attempts += 1;
        if self.context.draw_uint8() >= self.threshold {
            self.write_index += 1;
            true
        } else {
            self.done = true;
            false
        }
    }

    /// The context to draw the next element's value from.
    pub fn target(&mut self) -> &mut Context<'buf> {
        self.context
    }

    /// Records the value just drawn via `target()` for the current slot.
    pub fn push(&mut self, value: T) {
        debug_assert!(self.data.len() < self.write_index);
        self.data.push(value);
    }

    /// Transfers ownership of everything drawn so far to the caller.
    pub fn complete(self) -> Vec<T> {
        self.data
    }
}
