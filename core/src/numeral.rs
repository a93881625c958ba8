//! Chinese numerals to Arabic digits.
//!
//! [`NumeralStream`] decorates a [`WordStream`] and folds every maximal run of
//! numeral words into one decimal string: `二 百 零 三` becomes `203`,
//! `一 万` becomes `10000`. Other words pass through unchanged.
//!
//! Grammar handled by the state machine:
//! - digits `零〇一壹 .. 九玖` (0-9)
//! - small units `十拾 百佰 千仟` (10, 100, 1000), each strictly smaller than
//!   the previous small unit inside one group
//! - large units `万 亿`, which multiply everything accumulated so far and
//!   open a fresh group
//! - bare digit runs `二 零 一 九` read positionally, with an abbreviated-year
//!   rule when the run is followed by `年`
//!
//! A trailing digit only takes the next smaller unit when the run ends at it.
//! If a unit the grammar rejects follows instead, the digit counts as ones and
//! the unit is left in the stream: `三 百 五 千` reads as `305`, then `千`.
//!
//! The converter needs one word of lookahead from the stream it wraps, so it
//! cannot offer lookahead itself: `peek_word` always returns `None`.

use phf::phf_map;

use crate::words::WordStream;

static NUMERAL_CODES: phf::Map<&'static str, u8> = phf_map! {
    "零" => 0, "〇" => 0,
    "一" => 1, "壹" => 1,
    "二" => 2, "贰" => 2,
    "三" => 3, "叁" => 3,
    "四" => 4, "肆" => 4,
    "五" => 5, "伍" => 5,
    "六" => 6, "陆" => 6,
    "七" => 7, "柒" => 7,
    "八" => 8, "捌" => 8,
    "九" => 9, "玖" => 9,
    "十" => 10, "拾" => 10,
    "百" => 11, "佰" => 11,
    "千" => 12, "仟" => 12,
    "万" => 13,
    "亿" => 14,
};

const TEN: u8 = 10;
const THOUSAND: u8 = 12;
const TEN_THOUSAND: u8 = 13;
const HUNDRED_MILLION: u8 = 14;
const YEAR: &str = "年";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Other,
    Digit(u8),
    SmallUnit(u8),
    LargeUnit(u8),
}

impl Kind {
    fn of(word: Option<&str>) -> Kind {
        match word.and_then(|w| NUMERAL_CODES.get(w)).copied() {
            None => Kind::Other,
            Some(code @ 0..=9) => Kind::Digit(code),
            Some(code @ 10..=12) => Kind::SmallUnit(code),
            Some(code) => Kind::LargeUnit(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// first digit of a number
    AfterDigit,
    /// a small unit closed the current digit
    AfterSmallUnit,
    /// a zero placeholder inside a group, a digit must follow
    AfterZero,
    /// a digit inside a group, waiting for its unit
    AfterGroupDigit,
    /// 万 or 亿 closed a group
    AfterLargeUnit,
    /// two bare digits
    DigitPair,
    /// three or more bare digits
    DigitRun,
    /// a leading zero
    LeadingZero,
    /// a leading zero and one digit
    ZeroDigit,
    /// a leading zero and two or more digits
    ZeroDigitRun,
}

/// Magnitude-aware accumulator. `history` holds the partial sums closed by
/// large units; `building` is the group currently being read.
#[derive(Debug)]
struct Accumulator {
    building: i64,
    history: Vec<i64>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            building: 0,
            history: vec![0],
        }
    }

    fn flush_building(&mut self) {
        let top = self.history.pop().unwrap_or(0);
        self.history.push(top.saturating_add(self.building));
    }

    fn add_digit(&mut self, digit: i64) {
        self.flush_building();
        self.building = digit;
    }

    fn add_unit(&mut self, code: u8) {
        let magnitude = match code {
            HUNDRED_MILLION => 100_000_000,
            TEN_THOUSAND => 10_000,
            _ => {
                let scale = 10i64.saturating_pow(u32::from(code.saturating_sub(9)));
                self.building = self.building.saturating_mul(scale);
                return;
            }
        };
        self.flush_building();
        let top = self.history.pop().unwrap_or(0);
        self.history.push(top.saturating_mul(magnitude));
        self.history.push(0);
        self.building = 0;
    }

    fn sum_up(&mut self) {
        let sum = self
            .history
            .iter()
            .fold(self.building, |acc, v| acc.saturating_add(*v));
        self.history.clear();
        self.history.push(sum);
        self.building = 0;
    }

    /// Shift everything read so far one decimal place left.
    fn roll(&mut self) {
        self.sum_up();
        if let Some(top) = self.history.last_mut() {
            *top = top.saturating_mul(10);
        }
    }

    fn value(&mut self) -> i64 {
        self.sum_up();
        self.history[0]
    }
}

/// Numeral-folding decorator.
#[derive(Debug, Clone)]
pub struct NumeralStream<S> {
    source: S,
}

impl<S: WordStream> NumeralStream<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn consume(&mut self) {
        self.source.next_word();
    }
}

fn with_year_prefix(value: i64, short: &str, long: &str) -> String {
    if value < 10 {
        format!("{short}{value}")
    } else {
        format!("{long}{value}")
    }
}

impl<S: WordStream> WordStream for NumeralStream<S> {
    fn next_word(&mut self) -> Option<String> {
        let word = self.source.next_word()?;
        let mut acc = Accumulator::new();
        let mut large_limit = HUNDRED_MILLION;
        let mut small_limit = THOUSAND;
        // cleared when the group digit follows a zero: "一万零五" is 10005
        let mut shorthand = true;

        let mut state = match Kind::of(Some(&word)) {
            Kind::Digit(0) => State::LeadingZero,
            Kind::Digit(d) => {
                acc.add_digit(i64::from(d));
                State::AfterDigit
            }
            Kind::SmallUnit(TEN) if word == "十" => {
                acc.add_digit(10);
                small_limit = TEN - 1;
                State::AfterSmallUnit
            }
            _ => return Some(word),
        };

        while self.source.has_next() {
            let peeked = self.source.peek_word();
            let kind = Kind::of(peeked.as_deref());
            state = match (state, kind) {
                (State::AfterDigit, Kind::SmallUnit(code)) => {
                    self.consume();
                    acc.add_unit(code);
                    small_limit = code - 1;
                    State::AfterSmallUnit
                }
                (State::AfterDigit, Kind::LargeUnit(code)) => {
                    self.consume();
                    acc.add_unit(code);
                    large_limit = code - 1;
                    State::AfterLargeUnit
                }
                (State::AfterDigit, Kind::Digit(d)) => {
                    self.consume();
                    acc.roll();
                    acc.add_digit(i64::from(d));
                    State::DigitPair
                }
                (State::AfterSmallUnit, Kind::Digit(0)) => {
                    self.consume();
                    small_limit -= 1;
                    State::AfterZero
                }
                (State::AfterSmallUnit | State::AfterZero | State::AfterLargeUnit, Kind::Digit(d))
                    if d != 0 =>
                {
                    self.consume();
                    acc.add_digit(i64::from(d));
                    shorthand = state != State::AfterZero;
                    State::AfterGroupDigit
                }
                (State::AfterSmallUnit | State::AfterGroupDigit, Kind::LargeUnit(code))
                    if code <= large_limit =>
                {
                    self.consume();
                    acc.add_unit(code);
                    small_limit = THOUSAND;
                    large_limit = code - 1;
                    State::AfterLargeUnit
                }
                (State::AfterGroupDigit, Kind::SmallUnit(code)) if code <= small_limit => {
                    self.consume();
                    acc.add_unit(code);
                    small_limit = code - 1;
                    State::AfterSmallUnit
                }
                (State::AfterGroupDigit, Kind::SmallUnit(_) | Kind::LargeUnit(_)) => {
                    return Some(acc.value().to_string());
                }
                (State::AfterGroupDigit, _) => {
                    // "三百五": a trailing digit takes the next smaller unit
                    if shorthand && small_limit >= TEN {
                        acc.add_unit(small_limit);
                    }
                    return Some(acc.value().to_string());
                }
                (State::AfterLargeUnit, Kind::Digit(0)) => {
                    self.consume();
                    State::AfterZero
                }
                (State::DigitPair | State::DigitRun, Kind::Digit(d)) => {
                    self.consume();
                    acc.roll();
                    acc.add_digit(i64::from(d));
                    State::DigitRun
                }
                (State::DigitPair, _) if peeked.as_deref() == Some(YEAR) => {
                    return Some(with_year_prefix(acc.value(), "190", "19"));
                }
                (State::LeadingZero, Kind::Digit(d)) => {
                    self.consume();
                    acc.roll();
                    acc.add_digit(i64::from(d));
                    State::ZeroDigit
                }
                (State::ZeroDigit | State::ZeroDigitRun, Kind::Digit(d)) => {
                    self.consume();
                    acc.roll();
                    acc.add_digit(i64::from(d));
                    State::ZeroDigitRun
                }
                (State::ZeroDigit, _) if peeked.as_deref() == Some(YEAR) => {
                    return Some(with_year_prefix(acc.value(), "200", "20"));
                }
                _ => return Some(acc.value().to_string()),
            };
        }

        if state == State::AfterGroupDigit && shorthand && small_limit >= TEN {
            acc.add_unit(small_limit);
        }
        Some(acc.value().to_string())
    }

    fn peek_word(&self) -> Option<String> {
        None
    }

    fn skip_words(&mut self, count: usize) -> usize {
        (0..count).filter_map(|_| self.next_word()).count()
    }

    fn has_next(&self) -> bool {
        self.source.has_next()
    }
}
