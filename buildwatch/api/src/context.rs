/// The workspace a view is rendered for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkspaceContext {
    /// Namespace holding the resources of the workspace.
    pub namespace: String,
    /// Name of the workspace, used for console links.
    pub workspace: String,
}

impl WorkspaceContext {
    pub fn new(namespace: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            workspace: workspace.into(),
        }
    }
}
