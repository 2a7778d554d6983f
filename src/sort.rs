use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::fs::DirectoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortField {
    #[default]
    Name,
    Size,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Clicking the active column flips direction; a new column starts ascending.
    pub fn toggled(self, field: SortField) -> Self {
        if field == self.field {
            Self {
                field,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                field,
                direction: SortDirection::Asc,
            }
        }
    }
}

/// Stable three-tier sort: drives, then directories, then files.
///
/// Direction only reverses the comparison within a tier, and missing sizes
/// or timestamps always sort last.
pub fn order(entries: &mut [DirectoryEntry], spec: SortSpec) {
    entries.sort_by(|lhs, rhs| compare_entries(lhs, rhs, spec));
}

pub fn compare_entries(lhs: &DirectoryEntry, rhs: &DirectoryEntry, spec: SortSpec) -> Ordering {
    rhs.is_drive
        .cmp(&lhs.is_drive)
        .then_with(|| {
            if lhs.is_drive || rhs.is_drive {
                Ordering::Equal
            } else {
                rhs.is_directory.cmp(&lhs.is_directory)
            }
        })
        .then_with(|| match spec.field {
            SortField::Name => spec.direction.apply(compare_names(&lhs.name, &rhs.name)),
            SortField::Size => compare_optional(lhs.size, rhs.size, spec.direction),
            SortField::Modified => compare_optional(lhs.modified, rhs.modified, spec.direction),
        })
}

/// Dictionary order: letters compare case-insensitively first, then a
/// lowercase letter precedes its uppercase form.
pub fn compare_names(lhs: &str, rhs: &str) -> Ordering {
    lhs.chars()
        .flat_map(char::to_lowercase)
        .cmp(rhs.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            lhs.chars()
                .map(char::is_uppercase)
                .cmp(rhs.chars().map(char::is_uppercase))
        })
        .then_with(|| lhs.cmp(rhs))
}

fn compare_optional<T: Ord>(lhs: Option<T>, rhs: Option<T>, direction: SortDirection) -> Ordering {
    match (lhs, rhs) {
        (Some(a), Some(b)) => direction.apply(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
