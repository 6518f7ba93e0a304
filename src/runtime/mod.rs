pub mod builtins;
pub mod context;
pub mod environment;
pub mod error;
pub mod linker;
pub mod machine;
pub mod value;
