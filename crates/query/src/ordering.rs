//! Sort descriptors.

use alloc::string::String;
use core::cmp::Ordering;
use vigil_core::Record;

/// Orders records by one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    /// Compares two records on this descriptor's field.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = a.get_or_null(&self.field).cmp(b.get_or_null(&self.field));
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Compares two records on a list of descriptors, first difference wins.
pub fn compare_by(ordering: &[SortDescriptor], a: &Record, b: &Record) -> Ordering {
    for descriptor in ordering {
        let ord = descriptor.compare(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
