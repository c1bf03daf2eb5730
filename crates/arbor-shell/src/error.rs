use arbor_repo::RepoError;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("not connected: {0}")]
    NotConnected(String),
    #[error("{0}")]
    NotFound(String),
    /// Rejected by the shell before reaching the repository.
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Repository(RepoError),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line editor error: {0}")]
    LineEditor(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("script failed at line {line}: {message}")]
    Script { line: usize, message: String },
}

impl From<RepoError> for ShellError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::PathNotFound(p) => ShellError::NotFound(format!("path not found: {p}")),
            RepoError::ItemNotFound(p) => ShellError::NotFound(format!("item not found: {p}")),
            other => ShellError::Repository(other),
        }
    }
}

impl ShellError {
    /// Not-found conditions leave state untouched and are reported plainly.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShellError::NotFound(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),
    #[error("alias `{alias}` of `{command}` collides with an existing command or alias")]
    DuplicateAlias { alias: String, command: String },
}
