use std::fmt::{Display, Formatter, Result as FmtResult};
use std::panic::Location;

use serde::Serialize;

/// Source location captured at the point an error was constructed.
///
/// Built from [`std::panic::Location`] inside `#[track_caller]` functions so
/// that error messages carry the call site rather than the conversion site.
///
/// Renders as `[file:line:column]` and is appended to every error Display
/// string in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<&'static Location<'static>> for ErrorLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}:{}:{}]", self.file, self.line, self.column)
    }
}
