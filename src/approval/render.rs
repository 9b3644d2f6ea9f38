//! Review notifications and edit forms

use super::action::{ActionId, ActionVerb, RecordFamily};
use crate::channels::{ButtonStyle, FormField, FormRequest, MessageAction};
use crate::records::{ExtractedMemory, MemoryCandidate, MemoryType, Update};

/// Form field holding an Update's target
pub const FIELD_TARGET: &str = "target";
/// Form field holding an Update's value
pub const FIELD_VALUE: &str = "value";
/// Form field holding the encoded memory list
pub const FIELD_MEMORIES: &str = "memories";

/// Approve / Edit / Reject buttons for a record
pub fn review_actions(family: RecordFamily, record_id: &str) -> Vec<MessageAction> {
    [
        (ActionVerb::Approve, "Approve", Some(ButtonStyle::Primary)),
        (ActionVerb::Edit, "Edit", None),
        (ActionVerb::Reject, "Reject", Some(ButtonStyle::Danger)),
    ]
    .into_iter()
    .map(|(verb, label, style)| MessageAction {
        action_id: ActionId::new(verb, family, record_id).to_string(),
        label: label.to_string(),
        style,
    })
    .collect()
}

/// Review request text for an Update
pub fn update_review_text(update: &Update) -> String {
    let mut text = format!(
        "*Knowledge update for review* `{}`\n*Type:* {}\n*Target:* {}\n*Value:* {}\n*From:* <@{}>",
        update.id, update.kind, update.target, update.value, update.submitted_by
    );
    if let Some(channel) = &update.channel {
        text.push_str(&format!(" in <#{}>", channel));
    }
    if update.source != "message" {
        text.push_str(&format!("\n*Source:* {}", update.source));
    }
    text
}

/// Review request text for a MemoryCandidate
pub fn candidate_review_text(candidate: &MemoryCandidate) -> String {
    let mut text = format!(
        "*Memories for review* `{}`\nFrom <@{}> in #{} ({} messages)\n",
        candidate.id,
        candidate.submitted_by,
        candidate.channel,
        candidate.raw_messages.len()
    );
    for (i, item) in candidate.extracted_memories.iter().enumerate() {
        text.push_str(&format!("{}. [{}] {}", i + 1, item.memory_type, item.content));
        if let Some(context) = &item.context {
            text.push_str(&format!(" _({})_", context));
        }
        if !item.tags.is_empty() {
            text.push_str(&format!(" `{}`", item.tags.join(", ")));
        }
        text.push('\n');
    }
    text
}

/// Prefilled edit form for an Update
pub fn update_edit_form(update: &Update) -> FormRequest {
    FormRequest {
        callback_id: ActionId::new(ActionVerb::Edit, RecordFamily::Update, &update.id).to_string(),
        title: "Edit update".to_string(),
        fields: vec![
            FormField {
                name: FIELD_TARGET.to_string(),
                label: "Target".to_string(),
                value: update.target.clone(),
                multiline: false,
            },
            FormField {
                name: FIELD_VALUE.to_string(),
                label: "Value".to_string(),
                value: update.value.clone(),
                multiline: true,
            },
        ],
    }
}

/// Prefilled edit form for a MemoryCandidate
pub fn candidate_edit_form(candidate: &MemoryCandidate) -> FormRequest {
    FormRequest {
        callback_id: ActionId::new(ActionVerb::Edit, RecordFamily::Memory, &candidate.id)
            .to_string(),
        title: "Edit memories".to_string(),
        fields: vec![FormField {
            name: FIELD_MEMORIES.to_string(),
            label: "One per line: type | content | context | tags".to_string(),
            value: encode_memories(&candidate.extracted_memories),
            multiline: true,
        }],
    }
}

/// Encode items one per line as `type | content | context | tag1, tag2`
pub fn encode_memories(items: &[ExtractedMemory]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{} | {} | {} | {}",
                item.memory_type,
                item.content.replace('|', "/"),
                item.context.as_deref().unwrap_or("").replace('|', "/"),
                item.tags.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the edit-form encoding. Lines without a known type and some
/// content are skipped.
pub fn parse_memory_lines(text: &str) -> Vec<ExtractedMemory> {
    text.lines().filter_map(parse_memory_line).collect()
}

fn parse_memory_line(line: &str) -> Option<ExtractedMemory> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.splitn(4, '|').map(str::trim);
    let memory_type = parts.next()?.parse::<MemoryType>().ok()?;
    let content = parts.next().filter(|c| !c.is_empty())?.to_string();
    let context = parts
        .next()
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let tags = parts
        .next()
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ExtractedMemory {
        memory_type,
        content,
        context,
        tags,
    })
}
