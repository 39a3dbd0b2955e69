/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains a shared, line oriented log for recording bus traffic
    inside unit tests.

--*/
use std::{cell::RefCell, fmt, rc::Rc};

/// A line log that can be appended to without `&mut self`.
///
/// Clones share the same underlying buffer, so a test can keep a handle on
/// the log of a bus it has handed over to the code under test.
///
/// * Example
///
/// ```
/// use ipecc_emu_bus::testing::Log;
///
/// let log = Log::new();
/// log.push(format_args!("write(Word, {:#05x}, {:#x})", 0x50, 0x4_0000));
/// assert_eq!(log.as_string(), "write(Word, 0x050, 0x40000)\n");
/// assert_eq!(log.take(), vec!["write(Word, 0x050, 0x40000)".to_string()]);
/// assert!(log.take().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Log {
    /// Construct an empty `Log`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn push(&self, args: fmt::Arguments<'_>) {
        self.lines.borrow_mut().push(args.to_string());
    }

    /// Number of recorded lines.
    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    /// Returns the recorded lines joined with newlines, leaving the log
    /// untouched.
    pub fn as_string(&self) -> String {
        self.lines
            .borrow()
            .iter()
            .fold(String::new(), |mut acc, line| {
                acc.push_str(line);
                acc.push('\n');
                acc
            })
    }

    /// Empties the log and returns the previously recorded lines. Useful for
    /// writing assertions about recent traffic.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }

    /// Returns the recorded lines that start with `prefix`.
    pub fn filter(&self, prefix: &str) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }
}
