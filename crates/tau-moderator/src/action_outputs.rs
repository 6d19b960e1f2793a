use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tau_moderation::ActionResult;

const HEREDOC_DELIMITER: &str = "TAU_MODERATOR_EOF";

/// Renders one `GITHUB_OUTPUT` entry. Multi-line values use the
/// `name<<DELIMITER` form with a delimiter that does not occur in the value.
pub(crate) fn render_output(name: &str, value: &str) -> String {
    if !value.contains('\n') && !value.contains('\r') {
        return format!("{name}={value}\n");
    }
    let mut delimiter = HEREDOC_DELIMITER.to_string();
    let mut suffix = 0usize;
    while value.lines().any(|line| line == delimiter) {
        suffix += 1;
        delimiter = format!("{HEREDOC_DELIMITER}_{suffix}");
    }
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

pub(crate) fn render_action_outputs(result: &ActionResult) -> String {
    let mut rendered = render_output("action-taken", result.action_taken.as_str());
    rendered.push_str(&render_output("reason", &result.reason));
    rendered
}

/// Appends the run's outputs to the step output file.
pub(crate) fn write_action_outputs(path: &Path, result: &ActionResult) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open output file {}", path.display()))?;
    file.write_all(render_action_outputs(result).as_bytes())
        .with_context(|| format!("failed to write outputs to {}", path.display()))?;
    Ok(())
}
