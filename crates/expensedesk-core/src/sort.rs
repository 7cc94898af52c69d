//! Single-column sort toggle
//!
//! At most one column is sorted at a time. Toggling cycles the active column
//! through ascending, descending and unsorted; toggling another column starts
//! over at ascending on that column.

use crate::error::{CoreError, CoreResult};
use crate::models::{find_column, Column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Ascending),
            "desc" => Ok(SortDirection::Descending),
            other => Err(format!("Invalid sort direction: {}", other)),
        }
    }
}

/// Active sort: a column and a direction, both always present
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Wire form: `column,asc` or `column,desc`
    pub fn serialize(&self) -> String {
        format!("{},{}", self.column, self.direction)
    }

    /// Parse the wire form; a bare column means ascending
    pub fn parse(value: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidSort {
            value: value.to_string(),
        };
        let mut parts = value.splitn(2, ',');
        let column = parts.next().map(str::trim).filter(|c| !c.is_empty()).ok_or_else(invalid)?;
        let direction = match parts.next() {
            Some(direction) => direction.parse().map_err(|_| invalid())?,
            None => SortDirection::Ascending,
        };
        Ok(Self::new(column, direction))
    }
}

impl std::fmt::Display for SortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Sort state of a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<SortSpec>,
}

impl SortState {
    pub fn new(active: Option<SortSpec>) -> Self {
        Self { active }
    }

    pub fn active(&self) -> Option<&SortSpec> {
        self.active.as_ref()
    }

    /// Direction shown on `column`'s header, if it is the sorted one
    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        self.active
            .as_ref()
            .filter(|spec| spec.column == column)
            .map(|spec| spec.direction)
    }

    /// Advance the cycle for `column`
    pub fn toggle(&mut self, columns: &[Column], column: &str) -> CoreResult<()> {
        if find_column(columns, column).is_none() {
            return Err(CoreError::UnknownColumn {
                column: column.to_string(),
            });
        }
        self.active = match self.active.take() {
            Some(spec) if spec.column == column => match spec.direction {
                SortDirection::Ascending => Some(SortSpec::new(column, SortDirection::Descending)),
                SortDirection::Descending => None,
            },
            _ => Some(SortSpec::new(column, SortDirection::Ascending)),
        };
        Ok(())
    }

    /// Wire form, absent when unsorted
    pub fn serialize(&self) -> Option<String> {
        self.active.as_ref().map(SortSpec::serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EXPENSE_COLUMNS;

    #[test]
    fn test_toggle_cycle_closes() {
        for column in EXPENSE_COLUMNS {
            let mut sort = SortState::default();
            sort.toggle(EXPENSE_COLUMNS, column.id).unwrap();
            assert_eq!(sort.direction_of(column.id), Some(SortDirection::Ascending));
            sort.toggle(EXPENSE_COLUMNS, column.id).unwrap();
            assert_eq!(sort.direction_of(column.id), Some(SortDirection::Descending));
            sort.toggle(EXPENSE_COLUMNS, column.id).unwrap();
            assert_eq!(sort.active(), None);
            assert_eq!(sort.serialize(), None);
        }
    }

    #[test]
    fn test_other_column_restarts_ascending() {
        let mut sort = SortState::default();
        sort.toggle(EXPENSE_COLUMNS, "date").unwrap();
        sort.toggle(EXPENSE_COLUMNS, "date").unwrap();
        sort.toggle(EXPENSE_COLUMNS, "amount").unwrap();
        assert_eq!(sort.serialize().as_deref(), Some("amount,asc"));
        assert_eq!(sort.direction_of("date"), None);
    }

    #[test]
    fn test_prefix_column_names_are_distinct() {
        let columns = &[
            Column { id: "date", label: "Date", kind: crate::models::ColumnKind::Date },
            Column { id: "dateCreated", label: "Created", kind: crate::models::ColumnKind::Date },
        ];
        let mut sort = SortState::default();
        sort.toggle(columns, "dateCreated").unwrap();
        sort.toggle(columns, "date").unwrap();
        assert_eq!(sort.serialize().as_deref(), Some("date,asc"));
    }

    #[test]
    fn test_unknown_column() {
        let mut sort = SortState::default();
        assert!(matches!(
            sort.toggle(EXPENSE_COLUMNS, "payee"),
            Err(CoreError::UnknownColumn { .. })
        ));
        assert_eq!(sort.active(), None);
    }

    #[test]
    fn test_parse_sort_spec() {
        assert_eq!(
            SortSpec::parse("date,desc").unwrap(),
            SortSpec::new("date", SortDirection::Descending)
        );
        assert_eq!(
            SortSpec::parse("title").unwrap(),
            SortSpec::new("title", SortDirection::Ascending)
        );
        assert!(SortSpec::parse("date,sideways").is_err());
        assert!(SortSpec::parse(",asc").is_err());
    }
}
