/// Per-connection command sequence counter.
///
/// An 8-bit rolling identifier stamped into every command frame and
/// incremented (mod 256) after each send, whether or not a valid response
/// comes back. It is not used for acknowledgment matching. A session belongs
/// to exactly one connection; it is not synchronized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    next: u8,
}

impl Session {
    /// Creates a new session with the sequence counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with the sequence counter at `sequence`.
    pub fn starting_at(sequence: u8) -> Self {
        Self { next: sequence }
    }

    /// Returns the sequence number the next command will carry.
    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Returns the current sequence number and advances the counter.
    pub fn advance(&mut self) -> u8 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::Session;

    #[test]
    fn starts_at_zero() {
        let mut session = Session::new();
        assert_eq!(session.peek(), 0);
        assert_eq!(session.advance(), 0);
        assert_eq!(session.advance(), 1);
    }

    #[test]
    fn wraps_after_256_commands() {
        let mut session = Session::new();

        let first = session.advance();
        for _ in 0..255 {
            session.advance();
        }

        // the 257th command reuses the 1st command's sequence
        assert_eq!(session.advance(), first);
    }

    #[test]
    fn starting_at_wraps_from_given_value() {
        let mut session = Session::starting_at(0xFF);
        assert_eq!(session.advance(), 0xFF);
        assert_eq!(session.advance(), 0x00);
    }
}
