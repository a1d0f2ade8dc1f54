//! Status tokens returned by mutating operations.

use std::fmt;

/// The kind of write a `StatusToken` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Delete,
    Clear,
}

/// Success signal of a write: which store, what was done, how many records.
///
/// Failures never appear here; they are returned as `DriverError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusToken {
    pub store: String,
    pub operation: Operation,
    pub affected: usize,
}

impl StatusToken {
    pub fn new(store: impl Into<String>, operation: Operation, affected: usize) -> Self {
        Self {
            store: store.into(),
            operation,
            affected,
        }
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Add => write!(f, "Added {} items to {}", self.affected, self.store),
            Operation::Update => write!(f, "Updated {} items in {}", self.affected, self.store),
            Operation::Delete => write!(f, "Deleted {} items from {}", self.affected, self.store),
            Operation::Clear => write!(f, "Cleared {}", self.store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StatusToken::new("Order", Operation::Add, 2).to_string(),
            "Added 2 items to Order"
        );
        assert_eq!(
            StatusToken::new("Order", Operation::Clear, 0).to_string(),
            "Cleared Order"
        );
    }
}
