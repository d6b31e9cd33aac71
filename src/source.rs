//! Call-site resolution for log records.
//!
//! Public entry points are `#[track_caller]`, so the compiler hands them the
//! exact file and line of the external caller. The enclosing function name is
//! not part of [`Location`]; it is recovered by walking the live stack.
//!
//! With line tables available the frame sitting on that file and line is
//! used. Without them (a default `--release` build) symbol names still
//! resolve, and the first frame above this crate's logging entry points is
//! taken instead. Entry points are `#[inline(never)]` so that frame exists.
//!
//! The walk costs a stack unwind plus symbol lookups per record and stops as
//! soon as the caller is known. The `info!`, `error!` and `log!` macros
//! resolve the function name at compile time and skip the walk entirely.

use crate::record::{SourceLocation, UNKNOWN_FUNCTION};
use std::panic::Location;
use std::path::Path;

/// Modules whose frames sit between a caller and [`capture_call_site`].
const ENTRY_MODULES: [&str; 3] = [
    concat!(env!("CARGO_CRATE_NAME"), "::logger::"),
    concat!(env!("CARGO_CRATE_NAME"), "::middleware::"),
    concat!(env!("CARGO_CRATE_NAME"), "::source::"),
];

fn is_entry_frame(name: &str) -> bool {
    let name = name.trim_start_matches('<');
    !name.contains("::tests::") && ENTRY_MODULES.iter().any(|m| name.starts_with(m))
}

/// Picks the caller's function name out of resolved symbols, innermost first.
struct CallSiteSearch<'a> {
    file: &'a Path,
    line: u32,
    exact: Option<String>,
    caller: Option<String>,
    inside_entry: bool,
}

impl<'a> CallSiteSearch<'a> {
    fn new(file: &'a str, line: u32) -> Self {
        Self {
            file: Path::new(file),
            line,
            exact: None,
            caller: None,
            inside_entry: false,
        }
    }

    /// Feed the next symbol. Returns `false` once the answer is settled.
    fn visit(&mut self, name: &str, file: Option<&Path>, line: Option<u32>) -> bool {
        if file.is_some_and(|path| path.ends_with(self.file)) && line == Some(self.line) {
            self.exact = Some(name.to_string());
            return false;
        }
        if is_entry_frame(name) {
            self.inside_entry = true;
            return true;
        }
        if self.inside_entry && self.caller.is_none() {
            self.caller = Some(name.to_string());
            // No line tables: an exact match can never show up further out.
            return line.is_some();
        }
        true
    }

    fn function_name(self) -> String {
        self.exact
            .or(self.caller)
            .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string())
    }
}

/// Resolve `location` into a full [`SourceLocation`].
///
/// Must be called while the frame at `location` is still on the stack.
/// Prefers the frame on `location`'s file and line, then the first frame
/// outside this crate's entry points, and reports `"UNKNOWN"` when the
/// symbols cannot be resolved at all.
#[inline(never)]
pub fn capture_call_site(location: &'static Location<'static>) -> SourceLocation {
    let mut search = CallSiteSearch::new(location.file(), location.line());
    let mut searching = true;

    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if !searching {
                return;
            }
            if let Some(name) = symbol.name() {
                let name = format!("{:#}", name);
                searching = search.visit(&name, symbol.filename(), symbol.lineno());
            }
        });
        searching
    });

    SourceLocation::new(location.file(), location.line(), search.function_name())
}

/// Expands to the [`SourceLocation`] of the macro invocation.
#[doc(hidden)]
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::record::SourceLocation::new(::std::file!(), ::std::line!(), {
            fn f() {}
            fn type_name_of<T>(_: T) -> &'static str {
                ::std::any::type_name::<T>()
            }
            let name = type_name_of(f);
            name.strip_suffix("::f").unwrap_or(name)
        })
    };
}
