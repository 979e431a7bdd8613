use std::fmt;

use crate::{env::CallStack, thread::ThreadId, Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    /// Decodes the signed size passed by instrumented code: writes are
    /// negative.
    pub fn from_signed_size(size: i64) -> (Self, u64) {
        if size < 0 {
            (Self::Write, size.unsigned_abs())
        } else {
            (Self::Read, size as u64)
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => "read".fmt(f),
            Self::Write => "write".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
}

/// An access that no longer matches the invariant its instruction learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub tid: ThreadId,
    pub kind: AccessKind,
    pub size: u64,
    pub addr: Addr,
    pub ip: Addr,
    pub expected: String,
    pub actual: String,
    pub notes: Vec<Note>,
    pub call_stack: CallStack,
}

impl Diagnostic {
    pub fn new(
        tid: ThreadId,
        kind: AccessKind,
        size: u64,
        addr: Addr,
        ip: Addr,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            tid,
            kind,
            size,
            addr,
            ip,
            expected: expected.into(),
            actual: actual.into(),
            notes: Vec::new(),
            call_stack: CallStack::default(),
        }
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            message: message.into(),
        });
        self
    }

    pub fn with_call_stack(mut self, call_stack: CallStack) -> Self {
        self.call_stack = call_stack;
        self
    }

    /// Notes where `addr` lies relative to the expected range.
    pub fn with_relation(self, expected: Option<(Addr, u64)>) -> Self {
        let Some((lo, size)) = expected else {
            return self;
        };
        let addr = self.addr;
        let hi = lo.saturating_add(size);
        let note = if addr < lo {
            format!("address is {} bytes before expected", lo - addr)
        } else if addr >= hi {
            format!("address is {} bytes after expected", addr - hi)
        } else {
            format!("address is {} bytes inside expected", addr - lo)
        };
        self.with_note(note)
    }

    pub fn summary(&self) -> String {
        format!(
            "Invalid {} of size {} at address {:#x}; expected: {}; actual: {}",
            self.kind, self.size, self.addr, self.expected, self.actual
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Invalid {} of size {} in {} at {:#x}",
            self.kind, self.size, self.tid, self.ip
        )?;
        writeln!(f, "  address:  {:#x}", self.addr)?;
        writeln!(f, "  expected: {}", self.expected)?;
        writeln!(f, "  actual:   {}", self.actual)?;
        for note in &self.notes {
            writeln!(f, "  note: {}", note.message)?;
        }
        write!(f, "{}", self.call_stack)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    pub diagnostics: Vec<Diagnostic>,
    dropped: u64,
}

impl ErrorReport {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty() && self.dropped == 0
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Diagnostics that didn't fit under the configured limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic, max_diagnostics: usize) {
        if max_diagnostics == 0 || self.diagnostics.len() < max_diagnostics {
            self.diagnostics.push(diagnostic);
        } else {
            self.dropped += 1;
        }
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.dropped = 0;
        std::mem::take(&mut self.diagnostics)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return "no errors detected".fmt(f);
        }

        for (index, diagnostic) in self.diagnostics.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        if self.dropped > 0 {
            write!(f, "\n({} more errors not shown)", self.dropped)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    fn diag() -> Diagnostic {
        Diagnostic::new(
            ThreadId::new(1),
            AccessKind::Read,
            4,
            0x7ff0,
            0x4000,
            "stack array \"A\" of size 16 in this frame",
            "unknown",
        )
    }

    #[test]
    fn signed_size() {
        assert_eq!(AccessKind::from_signed_size(4), (AccessKind::Read, 4));
        assert_eq!(AccessKind::from_signed_size(-8), (AccessKind::Write, 8));
    }

    #[test]
    fn render() {
        let d = diag()
            .with_relation(Some((0x7fe0, 16)))
            .with_call_stack(CallStack::new([0x4000, 0x5010]));
        assert_eq!(
            d.summary(),
            "Invalid read of size 4 at address 0x7ff0; expected: stack array \"A\" of size 16 in this frame; actual: unknown"
        );
        insta::assert_snapshot!(d.to_string(), @r###"
        Invalid read of size 4 in thread1 at 0x4000
          address:  0x7ff0
          expected: stack array "A" of size 16 in this frame
          actual:   unknown
          note: address is 0 bytes after expected
           at 0x4000
           by 0x5010
        "###);
    }

    #[test]
    fn relation_notes() {
        let before = diag().with_relation(Some((0x8000, 16)));
        assert_eq!(before.notes[0].message, "address is 16 bytes before expected");
        let inside = diag().with_relation(Some((0x7fe8, 16)));
        assert_eq!(inside.notes[0].message, "address is 8 bytes inside expected");
        assert!(diag().with_relation(None).notes.is_empty());
    }

    #[test]
    fn report_limit() {
        let mut report = ErrorReport::default();
        assert_eq!(report.to_string(), "no errors detected");
        for _ in 0..3 {
            report.push(diag(), 2);
        }
        assert_eq!(report.len(), 2);
        assert_eq!(report.dropped(), 1);
        assert!(report.to_string().ends_with("(1 more errors not shown)"));
    }
}
