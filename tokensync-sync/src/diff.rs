//! Text rendering for conflicts: unified token diffs and the conflict summary.

use std::fmt::Write as _;

use similar::TextDiff;

use tokensync_core::{Conflict, Token};

/// Unified diff between the local and remote version of a token.
///
/// Each side is rendered as indented JSON so metadata differences show up
/// line by line.
pub fn render_token_diff(local: &Token, remote: &Token) -> String {
    let old = render_token(local);
    let new = render_token(remote);
    let old_header = format!("local/{}", local.name);
    let new_header = format!("remote/{}", remote.name);
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

/// Unified diff for a conflict's two versions.
pub fn render_conflict_diff(conflict: &Conflict) -> String {
    render_token_diff(&conflict.local_token, &conflict.remote_token)
}

/// Numbered summary of conflicts and their resolutions.
///
/// Returns an empty string when there are no conflicts.
pub fn render_conflict_summary(conflicts: &[Conflict]) -> String {
    if conflicts.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== Conflict Summary ===");
    let _ = writeln!(out, "Total conflicts: {}", conflicts.len());
    let _ = writeln!(out);
    for (i, conflict) in conflicts.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({})",
            i + 1,
            conflict.token_name,
            conflict.conflict_type
        );
        match &conflict.resolution {
            Some(resolution) => {
                let _ = writeln!(
                    out,
                    "   Resolution: {} - {}",
                    resolution.strategy, resolution.reason
                );
            }
            None => {
                let _ = writeln!(out, "   Resolution: pending");
            }
        }
    }
    out
}

fn render_token(token: &Token) -> String {
    let mut rendered = serde_json::to_string_pretty(token).unwrap_or_else(|_| {
        format!("{} = {} ({})", token.name, token.value, token.token_type)
    });
    rendered.push('\n');
    rendered
}

#[cfg(test)]
mod tests {
    use tokensync_core::{ConflictStrategy, Resolution, TokenType};

    use super::*;

    fn conflict() -> Conflict {
        Conflict::detect(
            &Token::new("color.primary", TokenType::Color, "#0056b3"),
            &Token::new("color.primary", TokenType::Color, "#007bff"),
        )
        .expect("conflict")
    }

    #[test]
    fn token_diff_has_headers_and_changed_value() {
        let diff = render_conflict_diff(&conflict());
        assert!(diff.contains("--- local/color.primary"));
        assert!(diff.contains("+++ remote/color.primary"));
        assert!(diff.contains("@@"));
        assert!(diff.contains("-  \"value\": \"#0056b3\""));
        assert!(diff.contains("+  \"value\": \"#007bff\""));
    }

    #[test]
    fn identical_tokens_have_empty_diff() {
        let token = Token::new("spacing.small", TokenType::Spacing, "8px");
        assert!(render_token_diff(&token, &token).is_empty());
    }

    #[test]
    fn summary_lists_resolutions_and_pending() {
        let mut resolved = conflict();
        resolved.resolution = Some(Resolution {
            strategy: ConflictStrategy::Remote,
            selected_token: Some(resolved.remote_token.clone()),
            reason: "Preferred remote version as per strategy".to_string(),
        });
        let pending = conflict();

        let summary = render_conflict_summary(&[resolved, pending]);
        assert!(summary.contains("Total conflicts: 2"));
        assert!(summary.contains("1. color.primary (both_modified)"));
        assert!(summary.contains("Resolution: remote - Preferred remote version"));
        assert!(summary.contains("Resolution: pending"));
    }

    #[test]
    fn summary_is_empty_without_conflicts() {
        assert!(render_conflict_summary(&[]).is_empty());
    }
}
