use crate::RowError;

/// Normalized CSV header: column names trimmed, lowercased, BOM stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim_start_matches('\u{feff}').trim().to_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.names.iter().position(|n| n == column)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single data row viewed through its file's header.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    header: &'a Header,
    cells: Vec<&'a str>,
}

impl<'a> Row<'a> {
    #[must_use]
    pub fn new(header: &'a Header, cells: Vec<&'a str>) -> Self {
        Self { header, cells }
    }

    /// Cell value for `column`, or `None` when the header lacks the column or the row is short.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.header.position(column)?;
        self.cells.get(idx).copied()
    }

    /// # Errors
    ///
    /// Returns [`RowError::MissingField`] if the column is absent or the row has no cell for it.
    pub fn require(&self, column: &'static str) -> Result<&'a str, RowError> {
        self.get(column).ok_or(RowError::MissingField(column))
    }

    #[must_use]
    pub fn optional(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or("")
    }
}
