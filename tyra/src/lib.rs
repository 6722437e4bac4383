//! Tyra Middle-End Library
//!
//! Type resolution and boundary-explicit lowering for a gradually-typed
//! source language. Stage one (`resolve`) turns the untyped input tree
//! into a fully typed IR; stage two (`lower`) makes every dynamic
//! boundary crossing and loop iteration plan explicit.

pub mod ast;
pub mod error;
pub mod ir;
pub mod lower;
pub mod resolve;
pub mod types;

pub use ast::Span;
pub use error::{Diagnostic, ErrorKind, Result};
pub use ir::DispatchMode;
pub use lower::lower_unit;
pub use resolve::{resolve_unit, ExternSymbols};
pub use types::Type;

/// Run both pipeline stages over one compilation unit
pub fn compile_unit(
    module: &ast::Module,
    externs: &ExternSymbols,
    dispatch_mode: DispatchMode,
) -> Result<ir::Module> {
    let typed = resolve_unit(module, externs)?;
    Ok(lower_unit(typed, dispatch_mode))
}
