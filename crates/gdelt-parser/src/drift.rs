//! Schema-drift bookkeeping: unknown JSON keys are warned about exactly once
//! per (record type, field) for the lifetime of the process, then silently
//! discarded.

use gdelt_model::RecordType;
use std::collections::HashSet;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref SEEN: Mutex<HashSet<(RecordType, String)>> = Mutex::new(HashSet::new());
}

/// Records an unknown field sighting. Returns true the first time the
/// (record type, field) pair is seen.
pub(crate) fn note(record_type: RecordType, field: &str) -> bool {
    SEEN.lock()
        .unwrap()
        .insert((record_type, field.to_string()))
}

pub(crate) fn warn_unknown_field(record_type: RecordType, field: &str) {
    if note(record_type, field) {
        tracing::warn!(
            record_type = %record_type,
            field,
            "unknown field in upstream record; discarding. \
             This usually means GDELT added a field the library does not know yet"
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_warning_per_model_field_pair() {
        assert!(note(RecordType::QuoteGraph, "brand_new_field_a"));
        assert!(!note(RecordType::QuoteGraph, "brand_new_field_a"));
        // A different model gets its own warning for the same field name.
        assert!(note(RecordType::GeoGraph, "brand_new_field_a"));
        assert!(note(RecordType::QuoteGraph, "brand_new_field_b"));
    }
}
