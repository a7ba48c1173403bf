/// Monotonic counter that tags outgoing requests so late responses can be dropped.
///
/// Issue a [`Ticket`] before awaiting, and check it when the response lands.
/// Invalidating bumps the counter, which makes every outstanding ticket stale.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    current: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new ticket. Only the newest ticket is ever current.
    pub fn issue(&mut self) -> Ticket {
        self.current += 1;
        Ticket(self.current)
    }

    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }
}
