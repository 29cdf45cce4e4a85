/// Document families with their own yearly counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Order,
    Quote,
    Invoice,
}

impl SequenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Order => "ORD",
            SequenceKind::Quote => "QUO",
            SequenceKind::Invoice => "INV",
        }
    }
}

/// `ORD-2026-0001`. Counters past 9999 simply widen.
pub fn format_number(kind: SequenceKind, year: i32, seq: i64) -> String {
    format!("{}-{}-{:04}", kind.prefix(), year, seq)
}
