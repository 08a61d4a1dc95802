//! Text of the backlog digest message (Telegram HTML markup).

use crate::ticket::Ticket;

/// Longest description shown per ticket, in characters.
pub const DESCRIPTION_LIMIT: usize = 80;

/// Russian noun form for `n`: `one` for 1, 21, ...; `few` for 2-4, 22-24, ...;
/// `many` otherwise (including 11-14).
pub fn russian_plural<'a>(n: i64, one: &'a str, few: &'a str, many: &'a str) -> &'a str {
    let n = n.abs();
    let mod10 = n % 10;
    let mod100 = n % 100;
    if mod10 == 1 && mod100 != 11 {
        one
    } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
        few
    } else {
        many
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Cut to [`DESCRIPTION_LIMIT`] characters, appending `…` when shortened.
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Build the digest for `total` unassigned tickets, listing `newest`.
pub fn build_digest(total: i64, newest: &[Ticket], link_url: Option<&str>) -> String {
    let word = russian_plural(total, "заявка", "заявки", "заявок");
    let mut text = format!("🚨 <b>Внимание:</b> {} {} без назначения", total, word);

    if !newest.is_empty() {
        let lines: Vec<String> = newest
            .iter()
            .map(|ticket| {
                format!(
                    "• <b>{}</b> — {} — {}",
                    ticket.date.format("%Y-%m-%d"),
                    escape_html(&ticket.address),
                    escape_html(&truncate_description(&ticket.description))
                )
            })
            .collect();
        text.push('\n');
        text.push_str(&lines.join("\n"));
    }

    if let Some(url) = link_url {
        text.push_str(&format!(
            "\n\n<a href=\"{}\">проверить заявки</a>",
            escape_html(url)
        ));
    }

    text
}
