//! Persona text tables
//!
//! Shorthand expansions, canned replies, fallbacks and the fixed copy used by
//! commands and menus.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const BOT_DISPLAY_NAME: &str = "Miss Tristin 💅";

pub const DEV1_USERNAME: &str = "@Just_Collins101";
pub const DEV2_USERNAME: &str = "@heis_tomi";

/// System prompt for the remote model
pub const SYSTEM_PROMPT: &str = "You are Miss Tristin, a 20-year-old American girl. \
    Keep responses under 150 characters. Be brief and sassy. \
    Never mention being AI. Use emojis sparingly. \
    Be casual and conversational like a real person.";

/// Reply to an empty direct address (e.g. a bare `@mention`)
pub const EMPTY_MENTION_REPLY: &str = "Yeah? 👀";

/// User-side placeholder recorded for an empty direct address
pub const EMPTY_MENTION_MARKER: &str = "[empty mention]";

/// Shorthand -> expansion, matched on the lowercase alphanumeric form of a word
static ACRONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("dyw", "do your worst"),
        ("wyd", "what you doing"),
        ("hru", "how are you"),
        ("wdym", "what do you mean"),
        ("idk", "i don't know"),
        ("tbh", "to be honest"),
        ("fr", "for real"),
        ("rn", "right now"),
        ("lol", "laugh out loud"),
        ("omg", "oh my god"),
        ("brb", "be right back"),
        ("gtg", "got to go"),
        ("irl", "in real life"),
        ("nvm", "never mind"),
        ("jk", "just kidding"),
        ("smh", "shaking my head"),
        ("fyi", "for your information"),
        ("imo", "in my opinion"),
        ("imho", "in my humble opinion"),
        ("tbf", "to be fair"),
        ("afaik", "as far as i know"),
        ("ikr", "i know right"),
        ("nm", "not much"),
        ("np", "no problem"),
        ("ty", "thank you"),
        ("yw", "you're welcome"),
        ("gg", "good game"),
        ("gl", "good luck"),
        ("hf", "have fun"),
        ("wb", "welcome back"),
        ("asap", "as soon as possible"),
        ("tf", "the fuck"),
        ("wth", "what the hell"),
        ("tfw", "that feeling when"),
    ])
});

const GREETING_HI: &[&str] = &["Hey! 👋", "Hi there! 😊", "Hello! 👀", "Hiiii 👋"];
const GREETING_HELLO: &[&str] = &["Hey! 😏", "Hello there! ✨", "Hi! 💁‍♀️", "Hiiii 👋"];
const GREETING_HEY: &[&str] = &["Hey! 😌", "What's up? 👀", "Hey there! 💫", "Hey! 😊"];
const HOW_ARE_YOU: &[&str] = &["I'm good 😊", "All good! 💖", "Sassy as ever 💅", "I'm good, you? 😊"];
const WHATS_UP: &[&str] = &["Not much 😏", "Chilling! You? 👀", "Same old 😌", "What's good? 😊"];
const THANKS: &[&str] = &["Welcome! 😊", "No problem! 💖", "Anytime! ✨"];
const RANGERS: &[&str] = &[
    "Duh, I'm not a Ranger. I'm more like a coffee-guzzling, Netflix-binging college girl. 🤪",
];

/// Whole-message or single-token canned replies
static CANNED: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("hi", GREETING_HI),
        ("hello", GREETING_HELLO),
        ("hey", GREETING_HEY),
        ("how are you", HOW_ARE_YOU),
        ("how r u", HOW_ARE_YOU),
        ("whats up", WHATS_UP),
        ("sup", WHATS_UP),
        ("thanks", THANKS),
        ("thank you", THANKS),
        ("ty", THANKS),
        ("yooo", &["Hiiii 👋", "Heyy! 😊", "Yo! 👀"][..]),
        ("yo", &["Hey! 😏", "Yo! 👀", "What's up? 😊"][..]),
        ("tf", &["What? 😏", "Something wrong? 👀", "You good? 🤔"][..]),
        ("lol", &["😂", "😭 fr?", "LOL", "😂😂"][..]),
        ("omg", &["I know right?! 😱", "OMG 😳", "No way! 😮"][..]),
        ("fr", &["Fr fr? 👀", "For real? 😏", "Deadass? 🤔"][..]),
        ("rangers", RANGERS),
        (
            "assemble",
            &["Power Rangers? More like Power Nappers 😴", "Assembling my thoughts... give me a sec 💭"][..],
        ),
    ])
});

/// Substrings that pull from the `rangers` list anywhere in a message
const KEYWORD_SUBSTRINGS: [&str; 2] = ["ranger", "assemble"];

/// Fallbacks when the bot was addressed directly
pub const DIRECT_FALLBACKS: &[&str] = &[
    "Yeah? 👀",
    "What's up? 😏",
    "I'm listening... 💁‍♀️",
    "You called? 😌",
    "Hmm? 💅",
    "idk, what's good? 🤔",
];

/// Fallbacks otherwise
pub const AMBIENT_FALLBACKS: &[&str] = &[
    "Say that again? 😏",
    "Interesting... 😌",
    "Go on... 👀",
    "Yeah? 💁‍♀️",
    "Uh huh... 💅",
    "idk, what's good? 🤔",
];

/// Replies when a user burns through the model budget
pub const SLOW_DOWN_REPLIES: &[&str] = &[
    "Slow down 😮‍💨 one at a time.",
    "Breathe, babe. I'm not a vending machine 💅",
    "You're talking way too fast 😒 give me a sec.",
];

/// Expand shorthand word by word; unmatched words pass through untouched
pub fn expand_acronyms(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let clean: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            ACRONYMS.get(clean.as_str()).copied().unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canned reply list for a message: whole message, then any single token,
/// then the keyword substrings
pub fn canned_replies(text: &str) -> Option<&'static [&'static str]> {
    let msg = text.trim().to_lowercase();

    if let Some(replies) = CANNED.get(msg.as_str()) {
        return Some(replies);
    }

    if let Some(replies) = msg.split_whitespace().find_map(|word| CANNED.get(word)) {
        return Some(replies);
    }

    if KEYWORD_SUBSTRINGS.iter().any(|k| msg.contains(k)) {
        return Some(RANGERS);
    }

    None
}

/// Roasts for photos, stickers, voice notes, ...
pub fn unsupported_roasts(first_name: &str) -> Vec<String> {
    vec![
        format!("Text only, {}. 😏", first_name),
        "Use your words... I know you have them. 😌".to_string(),
        "Nice try. Now type something. 😑".to_string(),
    ]
}

// ============ Fixed copy ============

pub fn join_prompt(first_name: &str, channels: &[String]) -> String {
    let list = channels
        .iter()
        .map(|ch| format!("• @{}", ch))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "👋 <b>Hey {}!</b>\n\nJoin ALL my channels then click verify:\n\n{}",
        teloxide::utils::html::escape(first_name),
        list
    )
}

pub const VERIFIED_GREETING: &str =
    "Oh, it's you... 👀\n\n<b>Miss Tristin here. 20. American.</b>\nWhat do you want? 👇";

pub const ALREADY_VERIFIED: &str = "<b>You're already verified!</b>\n\nWhat now? 👇";

pub const VERIFICATION_SUCCESS: &str = "✅ <b>Verification Successful!</b>\n\nWhat now? 👇";

pub const BACK_TO_MENU: &str = "<b>Back so soon?</b>\n\nWhat now? 👇";

pub fn missing_channels_text(missing: &[String]) -> String {
    let list = missing
        .iter()
        .map(|ch| format!("• @{}", ch))
        .collect::<Vec<_>>()
        .join("\n");
    format!("❌ <b>You haven't joined:</b>\n{}\n\nJoin ALL channels first!", list)
}

pub const HELP_TEXT: &str = "<b>🔥 HELP</b>\n\n<b>Commands:</b>\n• define [word]\n• translate en fr [text]\n\
    • rock/paper/scissors\n• /clear - Clear memory\n\n<b>Chat:</b>\n• @mention me\n\
    • Reply to me\n• Say 'Tristin'\n• Private message\n\n<i>I remember our last 5 messages 💭</i>";

pub fn about_text() -> String {
    format!(
        "<b>😎 ABOUT</b>\n\nCreators: {} &amp; {}\n\n<i>Built to entertain, coded to sass 💅</i>",
        DEV1_USERNAME, DEV2_USERNAME
    )
}

pub const CLEARED: &str = "🧹 Memory cleared!";
pub const NOTHING_TO_CLEAR: &str = "Nothing to clear 😏";

pub const DEFINE_WHAT: &str = "Define what? 🙄";
pub const DEFINE_FAILED: &str = "That word doesn't exist... or reality. 😏";
pub const TRANSLATE_USAGE: &str = "Use: translate en fr Hello";
pub const TRANSLATE_FAILED: &str = "Translation failed 😒";

pub fn definition_text(word: &str, definition: &str) -> String {
    format!(
        "<b>📖 {}</b>\n\n{}",
        teloxide::utils::html::escape(&word.to_uppercase()),
        teloxide::utils::html::escape(definition)
    )
}

pub fn unknown_word_text(word: &str) -> String {
    format!("'{}'? Never heard of it. 🙄", word)
}

pub fn translation_text(translated: &str) -> String {
    format!(
        "<b>🌍 TRANSLATION</b>\n\n{}",
        teloxide::utils::html::escape(translated)
    )
}

pub fn stats_text(users: usize, messages: u64, verified: usize, conversations: usize) -> String {
    format!(
        "<b>📊 STATS</b>\n\nUsers: {}\nMessages: {}\nVerified: {}\nConversations: {}",
        users, messages, verified, conversations
    )
}

/// `Xd Yh` past a day, `Xh Ym` otherwise
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

pub fn uptime_text(seconds: u64) -> String {
    format!("<b>⏱ UPTIME</b>\n\n{}", format_uptime(seconds))
}

pub const RPS_TEXT: &str =
    "<b>✂️ ROCK PAPER SCISSORS</b>\n\nJust send: rock, paper, or scissors\n\n<i>I'll go easy... maybe 😏</i>";
