//! Interned identifier strings.
//!
//! The interner is a global, append-only string table. Interning the same
//! text twice yields the same [`Symbol`], so identifier comparison in the
//! lexer, parser, and emitter is a `u32` comparison. Interned strings are
//! leaked to obtain `'static` references; the table lives for the whole
//! process and entries are never removed.
//!
//! Keywords are pre-interned at table construction so they always occupy
//! the same low indices regardless of input order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use ahash::RandomState;
use dashmap::DashMap;

/// Global string table, initialised on first use.
static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.preintern_keywords();
    table
});

/// Reserved words of the language, pre-interned for stable indices.
const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "while", "for", "in", "function", "return", "class", "extends", "new",
    "this", "super", "import", "from", "export", "const", "async", "await", "try", "catch",
    "finally", "throw", "match", "case", "default", "break", "continue", "true", "false", "null",
    "and", "or", "not", "scene", "route",
];

/// Two-way string table backed by `DashMap`.
struct StringTable {
    /// Text -> index.
    indices: DashMap<&'static str, u32, RandomState>,
    /// Index -> text.
    strings: DashMap<u32, &'static str, RandomState>,
    /// Next free index.
    next: AtomicU32,
}

impl StringTable {
    fn new() -> Self {
        Self {
            indices: DashMap::with_hasher(RandomState::new()),
            strings: DashMap::with_hasher(RandomState::new()),
            next: AtomicU32::new(0),
        }
    }

    fn preintern_keywords(&self) {
        for kw in KEYWORDS {
            self.intern(kw);
        }
    }

    fn intern(&self, text: &str) -> u32 {
        if let Some(index) = self.indices.get(text) {
            return *index;
        }

        // Leak to get a 'static key; a racing duplicate wastes one small
        // allocation and nothing else.
        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let index = *self
            .indices
            .entry(leaked)
            .or_insert_with(|| self.next.fetch_add(1, Ordering::Relaxed));
        self.strings.entry(index).or_insert(leaked);
        index
    }

    fn resolve(&self, index: u32) -> &'static str {
        self.strings
            .get(&index)
            .map(|entry| *entry)
            .unwrap_or("<unknown symbol>")
    }
}

/// An interned string.
///
/// Symbols are cheap to copy, compare, and hash. Use [`Symbol::as_str`]
/// to get the text back.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern a string, returning its symbol.
    pub fn intern(text: &str) -> Self {
        Symbol(STRING_TABLE.intern(text))
    }

    /// The interned text.
    pub fn as_str(&self) -> &'static str {
        STRING_TABLE.resolve(self.0)
    }

    /// Raw table index; stable for the lifetime of the process.
    #[inline]
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Symbol::intern(text)
    }
}
