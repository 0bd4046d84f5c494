use regex::{NoExpand, Regex, RegexBuilder};
use tracing::warn;

use crate::config::Substitution;
use crate::models::NormalizedEvent;

/// Case-insensitive replacement of every configured pattern, in table order.
/// Patterns that start and end with a letter only match whole words.
pub fn apply_text_substitutions(text: &str, table: &[Substitution]) -> String {
    let mut result = text.to_string();
    for substitution in table {
        let Some(regex) = compile(&substitution.pattern) else {
            continue;
        };
        result = regex
            .replace_all(&result, NoExpand(&substitution.replacement))
            .into_owned();
    }
    result
}

pub fn apply_event_substitutions(mut event: NormalizedEvent, table: &[Substitution]) -> NormalizedEvent {
    event.name = apply_text_substitutions(&event.name, table);
    event.venue = apply_text_substitutions(&event.venue, table);
    event.description = event
        .description
        .map(|description| apply_text_substitutions(&description, table));
    event
}

fn compile(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    let escaped = regex::escape(pattern);
    let whole_word = pattern.starts_with(|c: char| c.is_ascii_alphabetic())
        && pattern.ends_with(|c: char| c.is_ascii_alphabetic());
    let source = if whole_word {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };
    match RegexBuilder::new(&source).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(pattern, "skipping substitution: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn table() -> Vec<Substitution> {
        AppConfig::default().substitutions
    }

    #[test]
    fn replaces_case_insensitively() {
        let table = table();
        assert_eq!(
            apply_text_substitutions("Come see Cltfc play!", &table),
            "Come see Charlotte FC play!"
        );
        assert_eq!(
            apply_text_substitutions("CLTFC vs Atlanta", &table),
            "Charlotte FC vs Atlanta"
        );
        assert_eq!(
            apply_text_substitutions("clt fc watch party", &table),
            "Charlotte FC watch party"
        );
    }

    #[test]
    fn respects_word_boundaries() {
        let table = table();
        assert_eq!(apply_text_substitutions("xcltfcx", &table), "xcltfcx");
    }

    #[test]
    fn identity_without_matches_and_idempotent() {
        let table = table();
        let plain = "Jazz at the Visulite";
        assert_eq!(apply_text_substitutions(plain, &table), plain);

        for input in ["CLTFC vs Atlanta", "clt fc and cltfc", "nothing here"] {
            let once = apply_text_substitutions(input, &table);
            assert_eq!(apply_text_substitutions(&once, &table), once);
        }
    }

    #[test]
    fn replacement_is_literal() {
        let table = vec![Substitution {
            pattern: "a+b".to_string(),
            replacement: "$1 cash".to_string(),
        }];
        assert_eq!(apply_text_substitutions("A+B night", &table), "$1 cash night");
    }

    #[test]
    fn event_fields_are_substituted() {
        let event = NormalizedEvent {
            name: "CLTFC vs NYCFC".to_string(),
            venue: "Bank of America Stadium".to_string(),
            description: Some("cltfc home opener".to_string()),
            ..Default::default()
        };
        let event = apply_event_substitutions(event, &table());
        assert_eq!(event.name, "Charlotte FC vs NYCFC");
        assert_eq!(event.description.as_deref(), Some("Charlotte FC home opener"));
    }
}
