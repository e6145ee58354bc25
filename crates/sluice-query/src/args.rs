//! Placeholder allocation.

use sluice_core::Value;

/// Owns the bound arguments of one statement. The placeholder number handed
/// out for each argument equals its 1-based position in the argument list,
/// so numbering has no gaps and no reuse across clauses.
#[derive(Debug, Default)]
pub struct ArgCounter {
    args: Vec<Value>,
}

impl ArgCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` and return its placeholder, with `::cast` appended when
    /// given.
    ///
    /// A cast argument is stored in its text form so the conversion always
    /// goes through the target type's input function.
    pub fn bind(&mut self, value: Value, cast: Option<&str>) -> String {
        match cast {
            Some(cast) => {
                self.args.push(value.to_text().map(Value::String).unwrap_or_default());
                format!("${}::{}", self.args.len(), cast)
            }
            None => {
                self.args.push(value);
                format!("${}", self.args.len())
            }
        }
    }

    /// Number of arguments bound so far.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}
