//! Edge case tests for mythos-lex.
