//! Minimal unified diff generation for auto-proposed fixes.
//!
//! Fix proposals that carry concrete suggested changes are turned into
//! per-file unified diffs. The generator emits a single whole-file hunk
//! (old lines removed, new lines added); it trades hunk minimality for
//! predictability, which is all the apply worker needs.

use patchflow_types::diagnosis::SuggestedChange;

/// Render a suggested change as a unified diff.
pub fn unified_diff(change: &SuggestedChange) -> String {
    let before = change.before.as_deref().unwrap_or("");
    let old_lines: Vec<&str> = if before.is_empty() {
        vec![]
    } else {
        before.lines().collect()
    };
    let new_lines: Vec<&str> = if change.after.is_empty() {
        vec![]
    } else {
        change.after.lines().collect()
    };

    let old_start = if old_lines.is_empty() { 0 } else { 1 };
    let new_start = if new_lines.is_empty() { 0 } else { 1 };

    let mut out = String::new();
    out.push_str(&format!("--- a/{}\n", change.file_path));
    out.push_str(&format!("+++ b/{}\n", change.file_path));
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        old_start,
        old_lines.len(),
        new_start,
        new_lines.len()
    ));
    for line in &old_lines {
        out.push_str(&format!("-{line}\n"));
    }
    for line in &new_lines {
        out.push_str(&format!("+{line}\n"));
    }
    out
}

/// Render a placeholder diff for a fix that requires manual implementation.
pub fn placeholder_diff(description: &str) -> String {
    format!(
        "--- a/MANUAL_FIX.md\n+++ b/MANUAL_FIX.md\n@@ -0,0 +1,3 @@\n\
         +# Manual fix required\n\
         +\n\
         +{description}\n"
    )
}
