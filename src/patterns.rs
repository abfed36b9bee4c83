//! Static table of error signatures and canned explanations.
//!
//! Pure data plus a first-match-wins lookup. Ordering matters: specific
//! signatures come before broad ones, and the catch-all sits last so the
//! lookup is total for non-empty input. The table is loadable independently
//! of the explanation pipeline so matches can be unit tested in isolation.

use regex::Regex;

/// One entry in the pattern table.
pub struct PatternEntry {
    /// Stable identifier, useful in tests and logs.
    pub name: &'static str,
    /// Signature matched against the raw error text.
    pub signal: Regex,
    /// Canned explanation shown when the signature matches first.
    pub template: &'static str,
}

/// Identifier of the final catch-all entry.
pub const CATCH_ALL: &str = "GENERIC";

macro_rules! entry {
    ($name:expr, $pattern:expr, $template:expr) => {
        PatternEntry {
            name: $name,
            signal: Regex::new($pattern).expect("pattern table regex is valid"),
            template: $template,
        }
    };
}

/// Build the ordered pattern table. Specific entries first, catch-all last.
pub fn pattern_table() -> Vec<PatternEntry> {
    vec![
        entry!(
            "TYPE_ERROR",
            r"(?i)TypeError(:|\b).*(cannot read|is not a function|of (null|undefined))|TypeError:",
            "A value was used as the wrong type - most often reading a property or \
             calling a method on null or undefined. Check that the object exists \
             before accessing it, and trace where it was supposed to be assigned."
        ),
        entry!(
            "REFERENCE_ERROR",
            r"(?i)ReferenceError(:|\b)",
            "A variable was used before it was declared or outside the scope where \
             it exists. Look for a typo in the name or a missing import/declaration."
        ),
        entry!(
            "MODULE_NOT_FOUND",
            r"(?i)(cannot find module|MODULE_NOT_FOUND|ERR_MODULE_NOT_FOUND)",
            "The runtime could not resolve an imported module. Check the path for \
             typos, confirm the dependency is installed, and reinstall packages if \
             the lockfile changed recently."
        ),
        entry!(
            "SYNTAX_ERROR",
            r"(?i)SyntaxError(:|\b)|unexpected token",
            "The source file failed to parse. Look at the reported line for an \
             unbalanced bracket, a missing comma or quote, or syntax newer than \
             the runtime supports."
        ),
        entry!(
            "STACK_OVERFLOW",
            r"(?i)(RangeError.*call stack|maximum call stack size exceeded|stack overflow)",
            "The call stack overflowed, which almost always means unbounded \
             recursion. Find the function that calls itself and add or fix its \
             base case."
        ),
        entry!(
            "ADDR_IN_USE",
            r"(?i)EADDRINUSE|address already in use",
            "The port the program tried to bind is already taken, usually by an \
             earlier instance that never exited. Kill the stale process or choose \
             a different port."
        ),
        entry!(
            "FILE_NOT_FOUND",
            r"(?i)ENOENT|no such file or directory",
            "A file or directory the program expected does not exist. Check the \
             path (relative paths resolve against the working directory, not the \
             script location) and that the file was actually created."
        ),
        entry!(
            "CONN_REFUSED",
            r"(?i)ECONNREFUSED|connection refused",
            "A network connection was refused - nothing is listening at the target \
             host and port. Make sure the service is running and the address and \
             port are right."
        ),
        entry!(
            "PERMISSION_DENIED",
            r"(?i)EACCES|EPERM|permission denied",
            "The operating system denied access to a file, directory, or port. \
             Check ownership and permissions; ports below 1024 need elevated \
             privileges."
        ),
        entry!(
            "UNHANDLED_REJECTION",
            r"(?i)unhandled\s*(promise\s*)?rejection",
            "A promise rejected with no catch handler attached. Add a .catch() or \
             wrap the await in try/catch, then look at the rejection reason for \
             the underlying failure."
        ),
        entry!(
            "JSON_PARSE",
            r"(?i)(JSON\.parse|unexpected (token|end of JSON|character).*JSON|in JSON at position)",
            "JSON parsing failed on malformed input. Log the raw string before \
             parsing - common causes are an empty response body, an HTML error \
             page where JSON was expected, or a trailing comma."
        ),
        entry!(
            "OUT_OF_MEMORY",
            r"(?i)(heap out of memory|ENOMEM|out of memory)",
            "The process exhausted its memory allowance. Look for unbounded \
             caches, runaway arrays, or loading a huge file at once; raise the \
             memory limit only after ruling out a leak."
        ),
        entry!(
            CATCH_ALL,
            r"(?i)(error|fail|exception|warning|fatal|crash|traceback)",
            "Something went wrong that does not match a known signature. Read the \
             first line of the message for the immediate cause, and the deepest \
             frame of any stack trace that points into your own code."
        ),
    ]
}

/// First-match-wins lookup over the table. Falls back to the catch-all entry
/// for any input, so the result is total.
pub fn first_match<'t>(table: &'t [PatternEntry], text: &str) -> &'t PatternEntry {
    table
        .iter()
        .find(|entry| entry.signal.is_match(text))
        .or_else(|| table.last())
        .expect("pattern table is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_matches_type_error_template() {
        let table = pattern_table();
        let entry = first_match(
            &table,
            "TypeError: Cannot read properties of null (reading 'method')",
        );
        assert_eq!(entry.name, "TYPE_ERROR");
    }

    #[test]
    fn test_module_not_found_matches_module_template() {
        let table = pattern_table();
        let entry = first_match(&table, "Error: Cannot find module './x'");
        assert_eq!(entry.name, "MODULE_NOT_FOUND");
    }

    #[test]
    fn test_unrecognized_input_hits_catch_all() {
        let table = pattern_table();
        let entry = first_match(&table, "flibbertigibbet");
        assert_eq!(entry.name, CATCH_ALL);
    }

    #[test]
    fn test_catch_all_is_last() {
        let table = pattern_table();
        assert_eq!(table.last().map(|e| e.name), Some(CATCH_ALL));
    }

    #[test]
    fn test_specific_entries_precede_catch_all() {
        // "EADDRINUSE" also contains "error"-adjacent vocabulary in real
        // output; the specific entry must win.
        let table = pattern_table();
        let entry = first_match(&table, "Error: listen EADDRINUSE: address already in use :::3000");
        assert_eq!(entry.name, "ADDR_IN_USE");
    }

    #[test]
    fn test_reference_error() {
        let table = pattern_table();
        let entry = first_match(&table, "ReferenceError: foo is not defined");
        assert_eq!(entry.name, "REFERENCE_ERROR");
    }

    #[test]
    fn test_stack_overflow() {
        let table = pattern_table();
        let entry = first_match(&table, "RangeError: Maximum call stack size exceeded");
        assert_eq!(entry.name, "STACK_OVERFLOW");
    }

    #[test]
    fn test_unhandled_rejection() {
        let table = pattern_table();
        let entry = first_match(&table, "UnhandledPromiseRejection: oh no");
        assert_eq!(entry.name, "UNHANDLED_REJECTION");
    }

    #[test]
    fn test_every_template_non_empty() {
        for entry in pattern_table() {
            assert!(!entry.template.is_empty(), "{} has empty template", entry.name);
        }
    }

    #[test]
    fn test_enoent() {
        let table = pattern_table();
        let entry = first_match(&table, "Error: ENOENT: no such file or directory, open 'x.txt'");
        // ENOENT appears after MODULE_NOT_FOUND in the table but the text
        // contains no module wording, so it falls through correctly.
        assert_eq!(entry.name, "FILE_NOT_FOUND");
    }
}
