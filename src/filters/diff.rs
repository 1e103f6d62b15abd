//! Diff-level predicates applied to each file of a commit

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiffFilter {
    #[default]
    NoDiffFilter,
    /// Keep files whose path ends with one of the extensions
    OnlyDiffsWithFileTypes(Vec<String>),
    /// Drop files whose path ends with one of the extensions
    OnlyDiffsWithoutFileTypes(Vec<String>),
}

impl DiffFilter {
    pub fn accept(&self, path: &str) -> bool {
        match self {
            DiffFilter::NoDiffFilter => true,
            DiffFilter::OnlyDiffsWithFileTypes(types) => {
                types.iter().any(|t| path.ends_with(t.as_str()))
            }
            DiffFilter::OnlyDiffsWithoutFileTypes(types) => {
                !types.iter().any(|t| path.ends_with(t.as_str()))
            }
        }
    }
}

pub fn accept_all(filters: &[DiffFilter], path: &str) -> bool {
    filters.iter().all(|f| f.accept(path))
}
