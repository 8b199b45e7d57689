//! Operator confirmation before destructive runs.

use std::io::IsTerminal as _;

use anyhow::{Context as _, Result};
use inquire::Confirm;
use tracing::warn;
use wellspring_maintenance::bulk::Confirmation;

/// `--yes` grants outright. Otherwise the operator is asked, and a
/// non-interactive stdin counts as a refusal.
pub fn confirm_deletion(count: usize, target: &str, yes: bool) -> Result<Confirmation> {
    if yes {
        return Ok(Confirmation::Granted);
    }
    if !std::io::stdin().is_terminal() {
        warn!("stdin is not a terminal and --yes was not given");
        return Ok(Confirmation::Denied);
    }

    let confirmed = Confirm::new(&format!("Delete {count} item(s) from {target}?"))
        .with_default(false)
        .with_help_message("This cannot be undone")
        .prompt()
        .context("Failed to confirm")?;

    Ok(Confirmation::from_flag(confirmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_skips_prompt() {
        let confirmation = confirm_deletion(3, "cloudinary:Home/", true).unwrap();
        assert!(confirmation.is_granted());
    }
}
