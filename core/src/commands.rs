//! Answer template expansion.
//!
//! Stored answers may embed `{namespace:key}` placeholders. Namespaces that
//! start with `.` are commands and are handed to a [`PlaceholderResolver`];
//! other braces are ordinary text. Expansion repeats over its own output so a
//! random response can itself contain placeholders.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::response::ResponseBank;

/// Outcome of resolving one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    /// A command namespace that could not produce text.
    Failed,
    /// Keep the placeholder as written.
    Literal,
}

pub trait PlaceholderResolver {
    fn resolve(&self, namespace: &str, key: &str) -> Resolution;
}

const MONTHS: [&str; 12] = ["一", "二", "三", "四", "五", "六", "七", "八", "九", "十", "十一", "十二"];
const WEEKDAYS: [&str; 7] = ["星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日"];

/// The `.system.DateTime` command, evaluated at a given local time.
#[derive(Debug, Clone, Copy)]
pub struct DateTime {
    now: NaiveDateTime,
}

impl DateTime {
    pub fn at(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn month(&self) -> String {
        format!("{}月", MONTHS[self.now.month0() as usize])
    }

    pub fn day(&self) -> String {
        format!("{}日", self.now.day())
    }

    pub fn week(&self) -> &'static str {
        WEEKDAYS[self.now.weekday().num_days_from_monday() as usize]
    }

    pub fn noon(&self) -> &'static str {
        match self.now.hour() * 60 + self.now.minute() {
            m if m < 300 => "凌晨",
            m if m < 481 => "早上",
            m if m < 690 => "上午",
            m if m < 780 => "中午",
            m if m < 1080 => "下午",
            _ => "晚上",
        }
    }

    pub fn time(&self) -> String {
        let (_, hour) = self.now.hour12();
        format!("{}{}点{}分", self.noon(), hour, self.now.minute())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "month" => Some(self.month()),
            "day" => Some(self.day()),
            "week" => Some(self.week().to_string()),
            "noon" => Some(self.noon().to_string()),
            "time" => Some(self.time()),
            _ => None,
        }
    }
}

/// The registered commands: `.Random` and `.system.DateTime`.
pub struct CommandTable {
    responses: Option<Arc<ResponseBank>>,
    rng: RefCell<StdRng>,
    clock: Option<NaiveDateTime>,
}

impl CommandTable {
    pub fn new(responses: Option<Arc<ResponseBank>>) -> Self {
        Self {
            responses,
            rng: RefCell::new(StdRng::from_entropy()),
            clock: None,
        }
    }

    /// Seed the generator behind `.Random`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = RefCell::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Pin `.system.DateTime` to a fixed time.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn responses(&self) -> Option<&Arc<ResponseBank>> {
        self.responses.as_ref()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PlaceholderResolver for CommandTable {
    fn resolve(&self, namespace: &str, key: &str) -> Resolution {
        let found = match namespace {
            ".Random" => self
                .responses
                .as_ref()
                .and_then(|bank| bank.response(key, &mut *self.rng.borrow_mut()))
                .map(str::to_string),
            ".system.DateTime" => self.clock.map(DateTime::at).unwrap_or_else(DateTime::now).get(key),
            _ => None,
        };
        match found {
            Some(text) => Resolution::Resolved(text),
            None => Resolution::Failed,
        }
    }
}

/// Marker that replaces a placeholder whose command failed.
pub fn failure_marker(namespace: &str, key: &str) -> String {
    format!("{{this part failed: {namespace}:{key}}}")
}

/// One pass over `template`, resolving every placeholder once. A `{` without
/// a closing `}`, a span without `:` or a namespace without the leading `.`
/// is copied as is.
pub fn expand_once<R: PlaceholderResolver + ?Sized>(template: &str, resolver: &R) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let span = &after[..close];
        match span.split_once(':') {
            Some((namespace, key)) if namespace.starts_with('.') => match resolver.resolve(namespace, key) {
                Resolution::Resolved(text) => out.push_str(&text),
                Resolution::Literal => {
                    out.push('{');
                    out.push_str(span);
                    out.push('}');
                }
                Resolution::Failed => {
                    warn!(namespace, key, "placeholder could not be resolved");
                    out.push_str(&failure_marker(namespace, key));
                }
            },
            _ => {
                out.push('{');
                out.push_str(span);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Expand until the text stops changing, for at most `max_rounds` passes.
pub fn expand<R: PlaceholderResolver + ?Sized>(template: &str, resolver: &R, max_rounds: usize) -> String {
    let mut current = template.to_string();
    for _ in 0..max_rounds {
        let next = expand_once(&current, resolver);
        if next == current {
            return current;
        }
        current = next;
    }
    if expand_once(&current, resolver) != current {
        warn!(rounds = max_rounds, "template expansion did not settle");
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn table() -> CommandTable {
        let bank = ResponseBank::compile([("hi", "你好呀"), ("nested", "{.Random:hi}！")]);
        CommandTable::new(Some(Arc::new(bank)))
            .with_seed(1)
            .with_clock(at(2024, 11, 3, 14, 5))
    }

    #[test]
    fn date_time_keys() {
        // 2024-11-03 is a Sunday
        let dt = DateTime::at(at(2024, 11, 3, 14, 5));
        assert_eq!(dt.month(), "十一月");
        assert_eq!(dt.day(), "3日");
        assert_eq!(dt.week(), "星期日");
        assert_eq!(dt.noon(), "下午");
        assert_eq!(dt.time(), "下午2点5分");
        assert_eq!(dt.get("year"), None);
    }

    #[test]
    fn noon_boundaries() {
        let noon = |h, m| DateTime::at(at(2024, 1, 1, h, m)).noon();
        assert_eq!(noon(4, 59), "凌晨");
        assert_eq!(noon(5, 0), "早上");
        assert_eq!(noon(8, 0), "早上");
        assert_eq!(noon(8, 1), "上午");
        assert_eq!(noon(11, 30), "中午");
        assert_eq!(noon(13, 0), "下午");
        assert_eq!(noon(18, 0), "晚上");
    }

    #[test]
    fn expands_commands_and_keeps_literals() {
        let t = table();
        assert_eq!(expand("今天{.system.DateTime:week}", &t, 8), "今天星期日");
        assert_eq!(expand("{name:x}好", &t, 8), "{name:x}好");
        assert_eq!(expand("{没有冒号}", &t, 8), "{没有冒号}");
        assert_eq!(expand("半截{.Random:hi", &t, 8), "半截{.Random:hi");
    }

    #[test]
    fn nested_responses_are_expanded() {
        assert_eq!(expand("{.Random:nested}", &table(), 8), "你好呀！");
        assert_eq!(expand_once("{.Random:nested}", &table()), "{.Random:hi}！");
    }

    #[test]
    fn failures_leave_a_marker() {
        let t = table();
        assert_eq!(expand("{.Random:nope}", &t, 8), "{this part failed: .Random:nope}");
        assert_eq!(expand("{.system.Weather:today}", &t, 8), "{this part failed: .system.Weather:today}");
        assert_eq!(
            expand("{.Random:hi}", &CommandTable::default(), 8),
            "{this part failed: .Random:hi}"
        );
    }

    struct Echo;

    impl PlaceholderResolver for Echo {
        fn resolve(&self, namespace: &str, key: &str) -> Resolution {
            Resolution::Resolved(format!("<{{{namespace}:{key}}}>"))
        }
    }

    #[test]
    fn self_reproducing_placeholder_stops_at_the_cap() {
        let out = expand("{.a:b}", &Echo, 3);
        assert_eq!(out, "<<<{.a:b}>>>");
    }
}
