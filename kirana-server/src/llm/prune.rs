//! Sliding-window pruning for chat logs
//!
//! The LLM call only needs the recent tail of a conversation; the full
//! log is still persisted on the order as `raw_messages`.

use shared::models::order::ChatMessage;

/// Default character budget for a pruned chat window
pub const DEFAULT_CONTEXT_CHARS: usize = 12_000;

/// Render one message the way it is sent to the model
pub fn render_message(msg: &ChatMessage) -> String {
    format!("{}: {}", msg.sender, msg.text)
}

/// Keep the newest messages whose rendered length fits the cap.
///
/// Walks newest-to-oldest accumulating character counts; stops before the
/// first message that would exceed the cap. The result is returned in
/// chronological order. A single oversized newest message is still kept so
/// the call never goes out empty.
pub fn prune_messages(messages: &[ChatMessage], cap: usize) -> Vec<ChatMessage> {
    let mut kept: Vec<ChatMessage> = Vec::new();
    let mut used = 0usize;

    for msg in messages.iter().rev() {
        let len = render_message(msg).len() + 1; // newline separator
        if used + len > cap && !kept.is_empty() {
            break;
        }
        used += len;
        kept.push(msg.clone());
        if used >= cap {
            break;
        }
    }

    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, text: &str) -> ChatMessage {
        ChatMessage {
            sender: sender.into(),
            text: text.into(),
            timestamp: None,
        }
    }

    #[test]
    fn test_keeps_all_when_under_cap() {
        let messages = vec![msg("A", "first"), msg("B", "second")];
        let pruned = prune_messages(&messages, 12_000);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0].text, "first");
    }

    #[test]
    fn test_drops_oldest_first() {
        let messages = vec![
            msg("A", &"x".repeat(60)),
            msg("B", &"y".repeat(60)),
            msg("C", &"z".repeat(60)),
        ];
        // Each rendered message is ~64 chars; cap fits only the last two
        let pruned = prune_messages(&messages, 140);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0].sender, "B");
        assert_eq!(pruned[1].sender, "C");
    }

    #[test]
    fn test_single_oversized_message_survives() {
        let messages = vec![msg("A", &"x".repeat(20_000))];
        let pruned = prune_messages(&messages, 12_000);
        assert_eq!(pruned.len(), 1);
    }

    #[test]
    fn test_chronological_order_preserved() {
        let messages: Vec<ChatMessage> =
            (0..10).map(|i| msg("S", &format!("m{i}"))).collect();
        let pruned = prune_messages(&messages, 12_000);
        let texts: Vec<&str> = pruned.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts[0], "m0");
        assert_eq!(texts[9], "m9");
    }
}
