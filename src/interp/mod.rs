//! WASM interpreter: value stack, module store, and tree-walking executor.

pub mod exec;
pub mod store;
pub mod value;

pub use exec::{ExecOutcome, Interpreter, TraceEntry};
pub use store::{FuncRef, Store};
pub use value::{Frame, NativeNumeric, RefVal, Value};
