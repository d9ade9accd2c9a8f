// Library interface for LazyView
// Exposes the core modules for tests, benchmarks, and external tools

pub mod prefetch;
pub mod reader;
pub mod tree;
pub mod window;
