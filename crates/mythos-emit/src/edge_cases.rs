//! Edge case and lowering tests for mythos-emit.
