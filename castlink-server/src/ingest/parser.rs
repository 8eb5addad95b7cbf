//! Relay chat-log line parser
//!
//! The relay writes one message per line: `<timestamp> [<type>] <body>`,
//! with typed bodies for dm, free_gift, paid_gift, guard and superchat.
//! Body markers are the relay's native (Chinese) phrases. Anything that
//! does not parse is dropped here with a diagnostic.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use castlink_common::model::{EventKind, GuardTier, NormalizedEvent};

/// Parse one relay log line into a normalized event. Returns `None` for
/// blank, unknown-type and malformed lines.
pub fn parse_line(line: &str) -> Option<NormalizedEvent> {
    let line = line.trim_start_matches('\u{feff}').trim_end();
    if line.is_empty() {
        return None;
    }

    let (ts_str, rest) = line.split_once(" [")?;
    let (type_str, body) = rest.split_once(']')?;
    let body = body.trim();

    let timestamp = match parse_timestamp(ts_str) {
        Some(ts) => ts,
        None => {
            warn!("unparseable timestamp in relay line: {line}");
            return None;
        }
    };

    let parsed = match type_str {
        "dm" => parse_dm(body),
        "free_gift" => parse_gift(body, false),
        "paid_gift" => parse_gift(body, true),
        "guard" => parse_guard(body),
        "superchat" => parse_superchat(body),
        other => {
            debug!("ignoring relay line of unknown type {other:?}");
            return None;
        }
    };

    match parsed {
        Some((sender_id, kind)) => Some(NormalizedEvent::new(sender_id, timestamp, kind)),
        None => {
            warn!("malformed [{type_str}] body: {body}");
            None
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // the relay logs naive local-less timestamps; treated as UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `<user>：<message>` — a bare digit 1-9 body is a vote cast (0-based)
fn parse_dm(body: &str) -> Option<(String, EventKind)> {
    let (username, message) = body.split_once('：')?;
    let trimmed = message.trim();

    let kind = match trimmed.parse::<usize>() {
        Ok(n) if (1..=9).contains(&n) => EventKind::VoteCast { option_index: n - 1 },
        _ => EventKind::ChatMessage {
            text: trimmed.to_string(),
        },
    };
    Some((username.to_string(), kind))
}

/// `<user> 赠送了 <gift> x <qty>，总价 <value> <currency>`
///
/// Free gifts are priced in the platform's play currency and normalize to
/// zero monetary value.
fn parse_gift(body: &str, paid: bool) -> Option<(String, EventKind)> {
    let (username, rest) = body.split_once(" 赠送了 ")?;
    let (gift_name, rest) = rest.split_once(" x ")?;
    let (qty_str, rest) = rest.split_once('，')?;
    let quantity: u32 = qty_str.trim().parse().ok()?;

    let rest = rest.strip_prefix("总价 ")?;
    let currency = if paid { " 元" } else { " 银瓜子" };
    let (value_str, _) = rest.split_once(currency)?;
    let raw_value: f64 = value_str.trim().parse().ok()?;

    Some((
        username.to_string(),
        EventKind::Gift {
            gift_name: gift_name.to_string(),
            quantity,
            value: if paid { raw_value } else { 0.0 },
        },
    ))
}

/// `<user> 购买了 <n><unit> <tier>，总价 <value> 元`
fn parse_guard(body: &str) -> Option<(String, EventKind)> {
    let (username, rest) = body.split_once(" 购买了 ")?;

    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    let periods: u32 = rest[..digits_end].parse().ok()?;

    let tier = if rest.contains("舰长") {
        GuardTier::Captain
    } else if rest.contains("提督") {
        GuardTier::Admiral
    } else if rest.contains("总督") {
        GuardTier::Governor
    } else {
        return None;
    };

    let value_start = rest.find("总价 ")? + "总价 ".len();
    let (value_str, _) = rest[value_start..].split_once(" 元")?;
    let value: f64 = value_str.trim().parse().ok()?;

    Some((
        username.to_string(),
        EventKind::Membership {
            tier,
            periods,
            value,
        },
    ))
}

/// `<user> 发送了 <amount> 元的醒目留言：<message>`
fn parse_superchat(body: &str) -> Option<(String, EventKind)> {
    let (username, rest) = body.split_once(" 发送了 ")?;
    let (amount_str, message) = rest.split_once(" 元的醒目留言：")?;
    let amount: f64 = amount_str.trim().parse().ok()?;

    Some((
        username.to_string(),
        EventKind::Superchat {
            amount,
            message: message.to_string(),
        },
    ))
}
