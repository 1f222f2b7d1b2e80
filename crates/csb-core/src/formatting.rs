//! Telegram HTML helpers.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Length of `html` as Telegram counts it: UTF-16 units of the parsed text.
///
/// Tags count as nothing and each entity (`&amp;`, `&lt;`, ...) as one unit.
pub fn visible_len(html: &str) -> usize {
    let mut len = 0;
    let mut in_tag = false;
    let mut in_entity = false;
    for c in html.chars() {
        match c {
            '<' if !in_entity => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '&' => {
                in_entity = true;
                len += 1;
            }
            ';' if in_entity => in_entity = false,
            _ if in_entity => {}
            _ => len += c.len_utf16(),
        }
    }
    len
}

/// Fit a rendered message into `limit` visible units (see [`visible_len`]).
///
/// Keeps whole lines so no HTML tag is split (every tag we emit opens and
/// closes on one line) and appends an ellipsis line.
pub fn clamp_message(text: &str, limit: usize) -> String {
    if visible_len(text) <= limit {
        return text.to_string();
    }

    const MORE: &str = "\n…";
    let budget = limit.saturating_sub(visible_len(MORE));
    let mut used = 0;
    let mut kept = 0;
    for (idx, line) in text.split('\n').enumerate() {
        let cost = visible_len(line) + usize::from(idx > 0);
        if used + cost > budget {
            break;
        }
        used += cost;
        kept = idx + 1;
    }

    let head = text.split('\n').take(kept).collect::<Vec<_>>().join("\n");
    format!("{head}{MORE}")
}
