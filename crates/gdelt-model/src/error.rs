/// Error raised while promoting a raw record to a validated record.
///
/// These are row-scoped: the engine logs and skips the offending row rather
/// than failing the fetch, so the messages carry enough context to locate the
/// input.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("row has {actual} columns, expected {expected}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("column {column} ({name}): invalid integer {value:?}")]
    InvalidInt {
        column: usize,
        name: &'static str,
        value: String,
    },

    #[error("column {column} ({name}): invalid float {value:?}")]
    InvalidFloat {
        column: usize,
        name: &'static str,
        value: String,
    },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}': expected {expected}, got {value}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("raw record shape does not match record type: expected {0}")]
    WrongShape(&'static str),
}
