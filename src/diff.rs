//! Field-level comparison of desired and recorded properties.
//!
//! Each resource kind lists the properties it can converge and implements
//! [`Diffable`] over exactly that list, so there is no reflection over field
//! names anywhere.

use std::fmt::Debug;

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffDetail {
    /// Field that differs.
    pub field: &'static str,
    /// Recorded value.
    pub old_value: String,
    /// Desired value.
    pub new_value: String,
}

/// Collects [`DiffDetail`]s field by field.
#[derive(Debug, Default)]
pub struct FieldDiff {
    details: Vec<DiffDetail>,
}

impl FieldDiff {
    /// Creates an empty diff.
    #[must_use]
    pub const fn new() -> Self {
        Self { details: Vec::new() }
    }

    /// Records `field` if the two values differ.
    #[must_use]
    pub fn field<T: PartialEq + Debug + ?Sized>(
        mut self,
        field: &'static str,
        old: &T,
        new: &T,
    ) -> Self {
        if old != new {
            self.details.push(DiffDetail {
                field,
                old_value: format!("{old:?}"),
                new_value: format!("{new:?}"),
            });
        }
        self
    }

    /// Returns the collected differences.
    #[must_use]
    pub fn finish(self) -> Vec<DiffDetail> {
        self.details
    }
}

/// A property set that can be compared against another of the same kind.
pub trait Diffable {
    /// Lists the fields that differ between `self` (recorded) and `desired`.
    fn diff(&self, desired: &Self) -> Vec<DiffDetail>;

    /// Returns true if any field differs.
    fn differs_from(&self, desired: &Self) -> bool {
        !self.diff(desired).is_empty()
    }
}

/// Joins the names of the changed fields, e.g. `"path, port"`.
#[must_use]
pub fn changed_fields(details: &[DiffDetail]) -> String {
    details.iter().map(|d| d.field).collect::<Vec<_>>().join(", ")
}
