/*++

Licensed under the Apache-2.0 license.

File Name:

    log.rs

Abstract:

    File contains the channel trace shared between a test and the models it
    drives.

--*/

use std::{cell::RefCell, fmt, rc::Rc};

/// Line-oriented trace. Clones append to the same buffer, so a test keeps
/// one handle and gives another to the memory model or fake bus.
///
/// ```
/// use dma_emu_bus::testing::Log;
/// use std::fmt::Write;
///
/// let trace = Log::new();
/// writeln!(trace.w(), "AR addr=0x1000 len=3").unwrap();
/// writeln!(trace.w(), "R data=0x0 resp=OKAY last=0").unwrap();
/// assert_eq!(trace.count_prefix("AR "), 1);
/// assert_eq!(trace.lines().len(), 2);
/// assert!(trace.take().starts_with("AR "));
/// assert!(trace.lines().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Log {
    text: Rc<RefCell<String>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer for `write!` and `writeln!`.
    pub fn w(&self) -> impl fmt::Write + '_ {
        Appender(&self.text)
    }

    /// Drains the trace.
    pub fn take(&self) -> String {
        self.text.take()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text.borrow().lines().map(String::from).collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.text
            .borrow()
            .lines()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

struct Appender<'a>(&'a RefCell<String>);

impl fmt::Write for Appender<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.borrow_mut().push_str(s);
        Ok(())
    }
}
