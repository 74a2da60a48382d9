//! Inline keyboards: answer options, join gate, test menu

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback payload prefix for answer buttons ("ans:0".."ans:3")
pub const ANSWER_PREFIX: &str = "ans:";
/// Callback payload for the membership re-check button
pub const RECHECK_PAYLOAD: &str = "recheck";
/// Callback payload prefix for the test menu ("start:daily" / "start:practice")
pub const START_PREFIX: &str = "start:";

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// One button per option, each carrying an opaque answer-index payload.
pub fn answer_keyboard(options: &[String; 4]) -> InlineKeyboardMarkup {
    let rows = options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            vec![InlineKeyboardButton::callback(
                format!("{}) {}", OPTION_LETTERS[index], option),
                format!("{}{}", ANSWER_PREFIX, index),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Join link plus an "I've joined" re-check affordance.
pub fn join_keyboard(channel: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Ok(link) = url::Url::parse(&format!("https://t.me/{}", channel)) {
        rows.push(vec![InlineKeyboardButton::url("🔔 Join the channel", link)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "✅ I've joined",
        RECHECK_PAYLOAD,
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// The /start menu: one button per test type.
pub fn test_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📝 Daily test",
            format!("{}daily", START_PREFIX),
        )],
        vec![InlineKeyboardButton::callback(
            "📚 Practice test",
            format!("{}practice", START_PREFIX),
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_payloads_carry_option_indexes() {
        let options = ["one".into(), "two".into(), "three".into(), "four".into()];
        let keyboard = answer_keyboard(&options);

        assert_eq!(keyboard.inline_keyboard.len(), 4);
        for (i, row) in keyboard.inline_keyboard.iter().enumerate() {
            assert_eq!(row.len(), 1);
            match &row[0].kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                    assert_eq!(data, &format!("ans:{}", i));
                }
                other => panic!("expected callback button, got {:?}", other),
            }
        }
    }

    #[test]
    fn menu_payloads_parse_back_to_test_kinds() {
        let keyboard = test_menu_keyboard();
        let payloads: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .filter_map(|row| match &row[0].kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec!["start:daily", "start:practice"]);
    }
}
