//! Transaction manager configuration.

/// Configuration for a transaction manager.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to switch autocommit back on before closing a connection on
    /// which the manager switched it off. Only done after a successful
    /// commit or rollback.
    pub restore_auto_commit: bool,

    /// Label attached to the manager's log events.
    pub name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            restore_auto_commit: true,
            name: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to restore autocommit before close.
    #[must_use]
    pub fn restore_auto_commit(mut self, value: bool) -> Self {
        self.restore_auto_commit = value;
        self
    }

    /// Sets the label attached to log events.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.restore_auto_commit);
        assert!(config.name.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new().restore_auto_commit(false).name("orders");

        assert!(!config.restore_auto_commit);
        assert_eq!(config.name.as_deref(), Some("orders"));
    }
}
