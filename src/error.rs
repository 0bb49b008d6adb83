//! Error taxonomy for resolution, conversion and the Python code family.
//!
//! The first four variants are backtracking signals: the resolver records
//! them and moves on to the next candidate. The rest are fatal and abort a
//! request as soon as they surface.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForgeError {
    #[error("no catalog unit or provided name matches '{0}'")]
    UnknownCapability(String),

    #[error("dependency '{dependency}' of '{unit}' cannot be satisfied: {source}")]
    UnsatisfiableDependency {
        unit: String,
        dependency: String,
        #[source]
        source: Box<ForgeError>,
    },

    #[error("no resolvable converter removes {field} violation {value:?} in '{unit}'")]
    UnresolvableViolation {
        unit: String,
        field: String,
        value: String,
    },

    #[error("no ordering of converters {converters:?} leaves '{unit}' free of violations")]
    ConversionExhausted {
        unit: String,
        converters: Vec<String>,
    },

    #[error("unsupported restriction field '{0}'")]
    UnsupportedRestrictionField(String),

    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("malformed unit: {0}")]
    MalformedUnit(String),

    #[error("Python grammar unavailable: {0}")]
    Grammar(String),
}

impl ForgeError {
    /// Fatal errors stop the whole request instead of triggering backtracking.
    pub fn is_fatal(&self) -> bool {
        match self {
            ForgeError::UnsupportedRestrictionField(_)
            | ForgeError::Syntax { .. }
            | ForgeError::MalformedUnit(_)
            | ForgeError::Grammar(_) => true,
            ForgeError::UnsatisfiableDependency { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub(crate) fn syntax(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        ForgeError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..floor_char_boundary(source, offset)];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|idx| before[idx + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    (line, column)
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one() {
        let src = "a = 1\nbb = 2\n";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 6), (2, 1));
        assert_eq!(line_column(src, 9), (2, 4));
    }

    #[test]
    fn fatality_follows_the_wrapped_cause() {
        let nested = ForgeError::UnsatisfiableDependency {
            unit: "os__sys".into(),
            dependency: "sys".into(),
            source: Box::new(ForgeError::UnsupportedRestrictionField("colour".into())),
        };
        assert!(nested.is_fatal());
        assert!(!ForgeError::UnknownCapability("x".into()).is_fatal());
    }
}
