//! Mass-assignment protection

/// Decides which columns `fill` may write.
///
/// A non-empty fillable list is an allow-list. Otherwise a non-empty
/// guarded list is a deny-list (`"*"` denies everything). With both lists
/// empty every column is assignable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MassAssignmentGuard {
    fillable: Vec<String>,
    guarded: Vec<String>,
}

impl MassAssignmentGuard {
    pub fn new(fillable: Vec<String>, guarded: Vec<String>) -> Self {
        Self { fillable, guarded }
    }

    pub fn is_fillable(&self, column: &str) -> bool {
        if !self.fillable.is_empty() {
            return self.fillable.iter().any(|c| c == column);
        }
        if !self.guarded.is_empty() {
            return !self.guarded.iter().any(|c| c == column || c == "*");
        }
        true
    }

    pub fn fillable(&self) -> &[String] {
        &self.fillable
    }

    pub fn guarded(&self) -> &[String] {
        &self.guarded
    }

    pub(crate) fn add_fillable(&mut self, columns: impl IntoIterator<Item = String>) {
        self.fillable.extend(columns);
    }

    pub(crate) fn add_guarded(&mut self, columns: impl IntoIterator<Item = String>) {
        self.guarded.extend(columns);
    }
}
