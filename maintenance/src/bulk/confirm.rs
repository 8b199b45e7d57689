//! Confirmation precondition for destructive runs.

/// Whether an operator explicitly approved a destructive run.
///
/// Deletion entry points take one of these and refuse to touch the remote
/// collection unless it is [`Confirmation::Granted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    Granted,
    #[default]
    Denied,
}

impl Confirmation {
    /// Confirmation given non-interactively, e.g. by a `--yes` flag.
    pub fn from_flag(yes: bool) -> Self {
        if yes { Self::Granted } else { Self::Denied }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_denied() {
        assert!(!Confirmation::default().is_granted());
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(Confirmation::from_flag(true), Confirmation::Granted);
        assert_eq!(Confirmation::from_flag(false), Confirmation::Denied);
    }
}
