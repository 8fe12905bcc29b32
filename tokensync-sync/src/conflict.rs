//! Policy-driven conflict resolution.
//!
//! Every strategy is deterministic except `prompt` in interactive mode, which
//! is the only place this crate performs terminal I/O. Anything that cannot be
//! honoured (non-interactive prompt, unreadable input, invalid choice, unknown
//! strategy name) degrades to remote-wins and emits
//! [`SyncEvent::StrategyFallback`]; it is never an error.

use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset};

use tokensync_core::{Conflict, ConflictStrategy, Resolution, Token};

use crate::diff::render_conflict_diff;
use crate::observer::{LogObserver, SyncEvent, SyncObserver};

/// Metadata key consulted by the `newest` strategy (RFC 3339 timestamp).
pub const UPDATED_AT_KEY: &str = "updated_at";

/// Parse a strategy name, falling back to remote-wins for unknown names.
pub fn parse_strategy_lenient(name: &str, observer: &dyn SyncObserver) -> ConflictStrategy {
    match name.parse::<ConflictStrategy>() {
        Ok(strategy) => strategy,
        Err(_) => {
            observer.on_event(&SyncEvent::StrategyFallback {
                token: None,
                reason: format!("unknown conflict resolution strategy '{name}'"),
            });
            ConflictStrategy::Remote
        }
    }
}

struct PromptIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

pub struct ConflictResolver {
    strategy: ConflictStrategy,
    interactive: bool,
    observer: Arc<dyn SyncObserver>,
    prompt: Mutex<PromptIo>,
}

impl fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("strategy", &self.strategy)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

impl ConflictResolver {
    /// Non-interactive resolver reading prompts from stdin when enabled.
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            interactive: false,
            observer: Arc::new(LogObserver),
            prompt: Mutex::new(PromptIo {
                input: Box::new(BufReader::new(io::stdin())),
                output: Box::new(io::stdout()),
            }),
        }
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the terminal used by the `prompt` strategy.
    pub fn with_prompt_io(
        mut self,
        input: impl BufRead + Send + 'static,
        output: impl Write + Send + 'static,
    ) -> Self {
        self.prompt = Mutex::new(PromptIo {
            input: Box::new(input),
            output: Box::new(output),
        });
        self
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    pub fn resolve(&self, conflict: &Conflict) -> Resolution {
        match self.strategy {
            ConflictStrategy::Local => resolve_with_local(conflict),
            ConflictStrategy::Remote => resolve_with_remote(conflict),
            ConflictStrategy::Newest => resolve_with_newest(conflict),
            ConflictStrategy::Prompt => self.resolve_with_prompt(conflict),
            ConflictStrategy::Merge => resolve_with_merge(conflict),
        }
    }

    /// Resolve each conflict independently, in input order.
    pub fn resolve_all(&self, conflicts: &[Conflict]) -> Vec<Resolution> {
        conflicts.iter().map(|c| self.resolve(c)).collect()
    }

    fn fallback(&self, conflict: &Conflict, reason: &str) -> Resolution {
        self.observer.on_event(&SyncEvent::StrategyFallback {
            token: Some(conflict.token_name.clone()),
            reason: reason.to_string(),
        });
        resolve_with_remote(conflict)
    }

    fn resolve_with_prompt(&self, conflict: &Conflict) -> Resolution {
        if !self.interactive {
            return self.fallback(conflict, "interactive mode disabled");
        }

        let mut prompt = match self.prompt.lock() {
            Ok(prompt) => prompt,
            Err(poisoned) => poisoned.into_inner(),
        };
        let PromptIo { input, output } = &mut *prompt;

        if write_prompt(&mut **output, conflict).is_err() {
            return self.fallback(conflict, "failed to render conflict prompt");
        }

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => return self.fallback(conflict, "no input available"),
            Ok(_) => {}
            Err(err) => {
                return self.fallback(conflict, &format!("failed to read user input: {err}"))
            }
        }

        match line.trim() {
            "1" => Resolution {
                strategy: ConflictStrategy::Prompt,
                selected_token: Some(conflict.local_token.clone()),
                reason: "User selected local version".to_string(),
            },
            "2" => Resolution {
                strategy: ConflictStrategy::Prompt,
                selected_token: Some(conflict.remote_token.clone()),
                reason: "User selected remote version".to_string(),
            },
            "3" => Resolution {
                strategy: ConflictStrategy::Prompt,
                selected_token: None,
                reason: "User chose to skip this token".to_string(),
            },
            other => {
                let _ = writeln!(output, "Invalid choice, using remote version");
                self.fallback(conflict, &format!("invalid choice '{other}'"))
            }
        }
    }
}

fn resolve_with_local(conflict: &Conflict) -> Resolution {
    Resolution {
        strategy: ConflictStrategy::Local,
        selected_token: Some(conflict.local_token.clone()),
        reason: "Preferred local version as per strategy".to_string(),
    }
}

fn resolve_with_remote(conflict: &Conflict) -> Resolution {
    Resolution {
        strategy: ConflictStrategy::Remote,
        selected_token: Some(conflict.remote_token.clone()),
        reason: "Preferred remote version as per strategy".to_string(),
    }
}

/// Later `updated_at` wins; ties and missing timestamps go to remote.
fn resolve_with_newest(conflict: &Conflict) -> Resolution {
    let local = updated_at(&conflict.local_token);
    let remote = updated_at(&conflict.remote_token);
    let (selected, reason) = match (local, remote) {
        (Some(local), Some(remote)) if local > remote => (
            &conflict.local_token,
            format!("Local version is newer ({local} > {remote})"),
        ),
        (Some(_), Some(_)) => (
            &conflict.remote_token,
            "Remote version is newer or equally recent".to_string(),
        ),
        _ => (
            &conflict.remote_token,
            "No comparable timestamps, defaulted to remote".to_string(),
        ),
    };
    Resolution {
        strategy: ConflictStrategy::Newest,
        selected_token: Some(selected.clone()),
        reason,
    }
}

fn updated_at(token: &Token) -> Option<DateTime<FixedOffset>> {
    token
        .metadata
        .get(UPDATED_AT_KEY)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
}

/// Only metadata is merged; differing type or value selects remote wholesale.
fn resolve_with_merge(conflict: &Conflict) -> Resolution {
    let local = &conflict.local_token;
    let remote = &conflict.remote_token;
    if local.token_type != remote.token_type || local.value != remote.value {
        return Resolution {
            strategy: ConflictStrategy::Merge,
            selected_token: Some(remote.clone()),
            reason: "Cannot merge different values, used remote".to_string(),
        };
    }

    let mut merged = local.clone();
    merged.metadata.extend(
        remote
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    if is_blank(&merged.category) && !is_blank(&remote.category) {
        merged.category = remote.category.clone();
    }
    if is_blank(&merged.description) && !is_blank(&remote.description) {
        merged.description = remote.description.clone();
    }

    Resolution {
        strategy: ConflictStrategy::Merge,
        selected_token: Some(merged),
        reason: "Merged metadata from both versions".to_string(),
    }
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

fn write_prompt(out: &mut dyn Write, conflict: &Conflict) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Conflict Detected ===")?;
    writeln!(out, "Token: {}", conflict.token_name)?;
    writeln!(out, "Type: {}", conflict.conflict_type)?;
    writeln!(out)?;
    write_version(out, "Local", &conflict.local_token)?;
    write_version(out, "Remote", &conflict.remote_token)?;
    write!(out, "{}", render_conflict_diff(conflict))?;
    writeln!(out)?;
    writeln!(out, "Choose resolution:")?;
    writeln!(out, "  1) Use local version")?;
    writeln!(out, "  2) Use remote version")?;
    writeln!(out, "  3) Skip this token")?;
    writeln!(out)?;
    write!(out, "Enter choice (1-3): ")?;
    out.flush()
}

fn write_version(out: &mut dyn Write, label: &str, token: &Token) -> io::Result<()> {
    writeln!(out, "{label} version:")?;
    writeln!(out, "  Type:  {}", token.token_type)?;
    writeln!(out, "  Value: {}", token.value)?;
    if let Some(category) = token.category.as_deref().filter(|c| !c.is_empty()) {
        writeln!(out, "  Category: {category}")?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokensync_core::{ConflictType, TokenType};

    use super::*;
    use crate::observer::testing::RecordingObserver;

    /// Shared in-memory sink so tests can read back what the prompt printed.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("terminal detached"))
        }
    }

    fn value_conflict() -> Conflict {
        Conflict::detect(
            &Token::new("color.primary", TokenType::Color, "#0056b3").with_category("brand"),
            &Token::new("color.primary", TokenType::Color, "#007bff"),
        )
        .expect("conflict")
    }

    fn metadata_conflict(local: Token, remote: Token) -> Conflict {
        Conflict {
            token_name: local.name.clone(),
            local_token: local,
            remote_token: remote,
            conflict_type: ConflictType::BothModified,
            resolution: None,
        }
    }

    fn prompt_resolver(input: &str) -> (ConflictResolver, SharedBuf, Arc<RecordingObserver>) {
        let out = SharedBuf::default();
        let observer = Arc::new(RecordingObserver::default());
        let resolver = ConflictResolver::new(ConflictStrategy::Prompt)
            .interactive(true)
            .with_observer(observer.clone())
            .with_prompt_io(Cursor::new(input.as_bytes().to_vec()), out.clone());
        (resolver, out, observer)
    }

    fn selected_value(resolution: &Resolution) -> Option<&str> {
        resolution.selected_token.as_ref().map(|t| t.value.as_str())
    }

    #[test]
    fn local_and_remote_select_their_side() {
        let conflict = value_conflict();

        let local = ConflictResolver::new(ConflictStrategy::Local).resolve(&conflict);
        assert_eq!(local.strategy, ConflictStrategy::Local);
        assert_eq!(selected_value(&local), Some("#0056b3"));

        let remote = ConflictResolver::new(ConflictStrategy::Remote).resolve(&conflict);
        assert_eq!(remote.strategy, ConflictStrategy::Remote);
        assert_eq!(selected_value(&remote), Some("#007bff"));
    }

    #[test]
    fn newest_without_timestamps_defaults_to_remote() {
        let resolution = ConflictResolver::new(ConflictStrategy::Newest).resolve(&value_conflict());
        assert_eq!(resolution.strategy, ConflictStrategy::Newest);
        assert_eq!(selected_value(&resolution), Some("#007bff"));
    }

    #[test]
    fn newest_prefers_later_updated_at() {
        let local = Token::new("c", TokenType::Color, "#111")
            .with_metadata(UPDATED_AT_KEY, "2026-03-02T10:00:00Z");
        let remote = Token::new("c", TokenType::Color, "#222")
            .with_metadata(UPDATED_AT_KEY, "2026-03-01T10:00:00+00:00");
        let conflict = Conflict::detect(&local, &remote).expect("conflict");

        let resolution = ConflictResolver::new(ConflictStrategy::Newest).resolve(&conflict);
        assert_eq!(selected_value(&resolution), Some("#111"));

        let remote_later = metadata_conflict(
            local.clone(),
            remote.with_metadata(UPDATED_AT_KEY, "2026-03-03T00:00:00Z"),
        );
        let resolution = ConflictResolver::new(ConflictStrategy::Newest).resolve(&remote_later);
        assert_eq!(selected_value(&resolution), Some("#222"));
    }

    #[test]
    fn newest_with_unparseable_timestamp_defaults_to_remote() {
        let local = Token::new("c", TokenType::Color, "#111")
            .with_metadata(UPDATED_AT_KEY, "yesterday");
        let remote = Token::new("c", TokenType::Color, "#222")
            .with_metadata(UPDATED_AT_KEY, "2020-01-01T00:00:00Z");
        let conflict = Conflict::detect(&local, &remote).expect("conflict");
        let resolution = ConflictResolver::new(ConflictStrategy::Newest).resolve(&conflict);
        assert_eq!(selected_value(&resolution), Some("#222"));
    }

    #[test]
    fn merge_unions_metadata_when_content_matches() {
        let local = Token::new("spacing.md", TokenType::Spacing, "16px")
            .with_metadata("owner", "design")
            .with_metadata("shared", "local");
        let remote = Token::new("spacing.md", TokenType::Spacing, "16px")
            .with_category("layout")
            .with_description("Medium gap")
            .with_metadata("figma_id", "42")
            .with_metadata("shared", "remote");

        let resolution =
            ConflictResolver::new(ConflictStrategy::Merge).resolve(&metadata_conflict(local, remote));

        let merged = resolution.selected_token.expect("merged token");
        assert_eq!(resolution.strategy, ConflictStrategy::Merge);
        assert_eq!(merged.metadata.get("owner").map(String::as_str), Some("design"));
        assert_eq!(merged.metadata.get("figma_id").map(String::as_str), Some("42"));
        assert_eq!(
            merged.metadata.get("shared").map(String::as_str),
            Some("remote"),
            "remote wins on key collision"
        );
        assert_eq!(merged.category.as_deref(), Some("layout"));
        assert_eq!(merged.description.as_deref(), Some("Medium gap"));
    }

    #[test]
    fn merge_keeps_non_empty_local_descriptive_fields() {
        let local = Token::new("r", TokenType::BorderRadius, "4px")
            .with_category("shape")
            .with_description(String::new());
        let remote = Token::new("r", TokenType::BorderRadius, "4px")
            .with_category("geometry")
            .with_description("Small radius");

        let merged = ConflictResolver::new(ConflictStrategy::Merge)
            .resolve(&metadata_conflict(local, remote))
            .selected_token
            .expect("merged");
        assert_eq!(merged.category.as_deref(), Some("shape"));
        assert_eq!(merged.description.as_deref(), Some("Small radius"));
    }

    #[test]
    fn merge_with_different_values_selects_remote() {
        let resolution = ConflictResolver::new(ConflictStrategy::Merge).resolve(&value_conflict());
        assert_eq!(resolution.strategy, ConflictStrategy::Merge);
        assert_eq!(selected_value(&resolution), Some("#007bff"));
        assert!(resolution.reason.contains("Cannot merge"));
    }

    #[test]
    fn prompt_non_interactive_falls_back_to_remote() {
        let observer = Arc::new(RecordingObserver::default());
        let resolver =
            ConflictResolver::new(ConflictStrategy::Prompt).with_observer(observer.clone());

        let resolution = resolver.resolve(&value_conflict());
        assert_eq!(resolution.strategy, ConflictStrategy::Remote);
        assert_eq!(selected_value(&resolution), Some("#007bff"));
        assert_eq!(observer.fallbacks(), 1);
    }

    #[test]
    fn prompt_choices_select_local_remote_or_skip() {
        let (resolver, out, _) = prompt_resolver("1\n");
        let resolution = resolver.resolve(&value_conflict());
        assert_eq!(resolution.strategy, ConflictStrategy::Prompt);
        assert_eq!(selected_value(&resolution), Some("#0056b3"));
        let rendered = out.contents();
        assert!(rendered.contains("=== Conflict Detected ==="));
        assert!(rendered.contains("Category: brand"));
        assert!(rendered.contains("Enter choice (1-3): "));

        let (resolver, _, _) = prompt_resolver(" 2 \n");
        assert_eq!(selected_value(&resolver.resolve(&value_conflict())), Some("#007bff"));

        let (resolver, _, _) = prompt_resolver("3\n");
        let skipped = resolver.resolve(&value_conflict());
        assert_eq!(skipped.strategy, ConflictStrategy::Prompt);
        assert!(skipped.selected_token.is_none());
    }

    #[test]
    fn prompt_invalid_or_missing_input_falls_back_to_remote() {
        let (resolver, out, observer) = prompt_resolver("maybe\n");
        let resolution = resolver.resolve(&value_conflict());
        assert_eq!(resolution.strategy, ConflictStrategy::Remote);
        assert!(out.contents().contains("Invalid choice"));
        assert_eq!(observer.fallbacks(), 1);

        let (resolver, _, observer) = prompt_resolver("");
        assert_eq!(resolver.resolve(&value_conflict()).strategy, ConflictStrategy::Remote);
        assert_eq!(observer.fallbacks(), 1);
    }

    #[test]
    fn prompt_unreadable_input_falls_back_to_remote() {
        let observer = Arc::new(RecordingObserver::default());
        let resolver = ConflictResolver::new(ConflictStrategy::Prompt)
            .interactive(true)
            .with_observer(observer.clone())
            .with_prompt_io(BufReader::new(FailingReader), io::sink());

        let resolution = resolver.resolve(&value_conflict());
        assert_eq!(selected_value(&resolution), Some("#007bff"));
        assert_eq!(observer.fallbacks(), 1);
    }

    #[test]
    fn prompt_reads_one_line_per_conflict() {
        let (resolver, _, _) = prompt_resolver("1\n3\n2\n");
        let conflicts = vec![value_conflict(), value_conflict(), value_conflict()];
        let resolutions = resolver.resolve_all(&conflicts);
        let picked: Vec<_> = resolutions.iter().map(selected_value).collect();
        assert_eq!(picked, vec![Some("#0056b3"), None, Some("#007bff")]);
    }

    #[test]
    fn lenient_parse_falls_back_for_unknown_names() {
        let observer = RecordingObserver::default();
        assert_eq!(parse_strategy_lenient("merge", &observer), ConflictStrategy::Merge);
        assert_eq!(observer.fallbacks(), 0);
        assert_eq!(parse_strategy_lenient("coin-flip", &observer), ConflictStrategy::Remote);
        assert_eq!(observer.fallbacks(), 1);
    }
}
