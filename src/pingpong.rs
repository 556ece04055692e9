//! Ping-pong double buffering.
//!
//! Two storage regions with alternating "current" (read) and "next" (write)
//! roles. A pass reads `current` and writes `next`; [`PingPong::swap`] flips
//! the roles once the whole step is done.

/// A pair of buffers with swappable read/write roles.
#[derive(Clone, Debug)]
pub struct PingPong<T> {
    a: T,
    b: T,
    current_is_a: bool,
}

impl<T> PingPong<T> {
    /// Create a pair with `a` as the current buffer.
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            current_is_a: true,
        }
    }

    #[inline]
    pub fn current(&self) -> &T {
        if self.current_is_a {
            &self.a
        } else {
            &self.b
        }
    }

    #[inline]
    pub fn next(&self) -> &T {
        if self.current_is_a {
            &self.b
        } else {
            &self.a
        }
    }

    /// Borrow `current` for reading and `next` for writing at the same time.
    #[inline]
    pub fn split(&mut self) -> (&T, &mut T) {
        if self.current_is_a {
            (&self.a, &mut self.b)
        } else {
            (&self.b, &mut self.a)
        }
    }

    /// Both buffers, mutably, in `(current, next)` order.
    #[inline]
    pub fn both_mut(&mut self) -> (&mut T, &mut T) {
        if self.current_is_a {
            (&mut self.a, &mut self.b)
        } else {
            (&mut self.b, &mut self.a)
        }
    }

    /// 0 while `a` is current, 1 while `b` is current.
    ///
    /// Used to pick between resources prebuilt for each role assignment.
    #[inline]
    pub fn parity(&self) -> usize {
        if self.current_is_a {
            0
        } else {
            1
        }
    }

    /// Flip the roles: the buffer just written becomes readable.
    #[inline]
    pub fn swap(&mut self) {
        self.current_is_a = !self.current_is_a;
    }
}
