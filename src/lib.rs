pub mod compiler;
pub mod diagnostics;
pub mod engine;
pub mod language;
pub mod runtime;

#[cfg(test)]
mod tests;
