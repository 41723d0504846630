/// Ordered column names of the rows handed to one write operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the position of the first column named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the first column equal to `name` ignoring ASCII case, with its position.
    pub fn find_ignore_case(&self, name: &str) -> Option<(usize, &str)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.eq_ignore_ascii_case(name))
            .map(|(index, column)| (index, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
