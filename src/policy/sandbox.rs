//! Sandbox screen for free-form query expressions
//!
//! A textual heuristic, not a sound sandbox: the expression must mention
//! at least one allow-listed read-only operation, must not contain any
//! deny-listed fragment, and must not open with a literal character
//! (which would make it bare data masquerading as a query). String
//! matching cannot enumerate every dangerous construct; actual
//! evaluation goes through the executor's closed grammar, and this
//! screen stays in front of it as the documented compatibility surface.
//! Admin expressions skip the screen entirely.

/// Read-only operations an expression must invoke at least one of
pub const ALLOWED_OPERATIONS: &[&str] = &[
    ".find(",
    ".find_one(",
    ".aggregate(",
    ".distinct(",
    ".count_documents(",
    ".estimated_document_count(",
    ".index_information(",
];

/// Fragments that reject an expression outright: imports, raw driver or
/// shell access, command execution, and every mutating operation
pub const DENIED_FRAGMENTS: &[&str] = &[
    "import",
    "driver.",
    "shell(",
    "command(",
    "exec(",
    "eval(",
    "spawn(",
    "subprocess(",
    "call(",
    "run(",
    "popen(",
    "bulk_write(",
    "insert(",
    "update(",
    "delete(",
    "drop(",
    "create_index(",
    "create_collection(",
];

/// Characters that may not open an expression
const LITERAL_OPENERS: [char; 6] = ['"', '\'', '[', '(', '{', '\\'];

/// Static screen over free-form expression text
pub struct Sandbox;

impl Sandbox {
    /// Returns true when the expression passes the screen
    pub fn check_expression(text: &str) -> bool {
        let trimmed = text.trim();
        let Some(first) = trimmed.chars().next() else {
            return false;
        };
        if LITERAL_OPENERS.contains(&first) {
            return false;
        }
        if DENIED_FRAGMENTS.iter().any(|f| trimmed.contains(f)) {
            return false;
        }
        ALLOWED_OPERATIONS.iter().any(|op| trimmed.contains(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_call_accepted() {
        assert!(Sandbox::check_expression("db['sources'].find({'field': 1})"));
        assert!(Sandbox::check_expression(
            "db['sources'].count_documents({})"
        ));
    }

    #[test]
    fn test_denied_fragment_rejected_even_with_allowed_call() {
        assert!(!Sandbox::check_expression(
            "import os; db['sources'].find({})"
        ));
        assert!(!Sandbox::check_expression(
            "db['sources'].find({}); db['sources'].insert({})"
        ));
    }

    #[test]
    fn test_no_allowed_call_rejected() {
        assert!(!Sandbox::check_expression("db['sources']"));
        assert!(!Sandbox::check_expression(""));
    }

    #[test]
    fn test_literal_opener_rejected() {
        // bare data masquerading as a query, even naming an allowed call
        assert!(!Sandbox::check_expression("{'find(': 1}"));
        assert!(!Sandbox::check_expression("[db['sources'].find({})]"));
        assert!(!Sandbox::check_expression("(db['sources'].find({}))"));
        assert!(!Sandbox::check_expression("'db.find('"));
        assert!(!Sandbox::check_expression("\\x64b.find("));
    }

    #[test]
    fn test_mutating_operations_rejected() {
        for text in [
            "db['sources'].update({}, {})",
            "db['sources'].delete({})",
            "db['sources'].bulk_write([])",
            "db['sources'].create_index('field')",
            "db.create_collection('x')",
        ] {
            assert!(!Sandbox::check_expression(text), "{} should be rejected", text);
        }
    }
}
