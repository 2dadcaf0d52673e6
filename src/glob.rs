//! Extended shell glob matching, used for bulk pruning of facts.
//!
//! Supported syntax:
//! * `?` any single character, `*` any sequence of characters (including `/`)
//! * `[...]` bracket classes with ranges, `!`/`^` negation and POSIX names
//!   such as `[:digit:]`
//! * `\x` escapes `x`
//! * extglob groups `?(a|b)`, `*(a|b)`, `+(a|b)`, `@(a|b)` and `!(a|b)`
//!
//! Like `fnmatch`, a malformed class or group is matched literally.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
    ExactlyOne,
    Not,
}

#[derive(Debug, Clone)]
enum Member {
    Single(char),
    Range(char, char),
    Named(String),
}
impl Member {
    fn contains(&self, c: char) -> bool {
        match self {
            Member::Single(m) => *m == c,
            Member::Range(low, high) => *low <= c && c <= *high,
            Member::Named(name) => match name.as_str() {
                "alpha" => c.is_ascii_alphabetic(),
                "digit" => c.is_ascii_digit(),
                "alnum" => c.is_ascii_alphanumeric(),
                "upper" => c.is_ascii_uppercase(),
                "lower" => c.is_ascii_lowercase(),
                "space" => c.is_ascii_whitespace(),
                "blank" => c == ' ' || c == '\t',
                "punct" => c.is_ascii_punctuation(),
                "xdigit" => c.is_ascii_hexdigit(),
                "cntrl" => c.is_ascii_control(),
                "print" => c.is_ascii_graphic() || c == ' ',
                "graph" => c.is_ascii_graphic(),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Literal(char),
    AnyChar,
    AnyString,
    Class { negated: bool, members: Vec<Member> },
    Group { repeat: Repeat, alternatives: Vec<Vec<Token>> },
}

// ------------- Parsing -------------

fn parse_sequence(chars: &[char], i: &mut usize, in_group: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    while *i < chars.len() {
        let c = chars[*i];
        if in_group && (c == ')' || c == '|') {
            break;
        }
        let opens_group = chars.get(*i + 1) == Some(&'(');
        let repeat = match c {
            '?' => Some(Repeat::ZeroOrOne),
            '*' => Some(Repeat::ZeroOrMore),
            '+' => Some(Repeat::OneOrMore),
            '@' => Some(Repeat::ExactlyOne),
            '!' => Some(Repeat::Not),
            _ => None,
        };
        if let (Some(repeat), true) = (repeat, opens_group) {
            if let Some((alternatives, next)) = parse_group(chars, *i + 1) {
                tokens.push(Token::Group {
                    repeat,
                    alternatives,
                });
                *i = next;
                continue;
            }
        }
        match c {
            '?' => tokens.push(Token::AnyChar),
            '*' => {
                if !matches!(tokens.last(), Some(Token::AnyString)) {
                    tokens.push(Token::AnyString);
                }
            }
            '\\' if *i + 1 < chars.len() => {
                *i += 1;
                tokens.push(Token::Literal(chars[*i]));
            }
            '[' => match parse_class(chars, *i) {
                Some((token, next)) => {
                    tokens.push(token);
                    *i = next;
                    continue;
                }
                None => tokens.push(Token::Literal('[')),
            },
            _ => tokens.push(Token::Literal(c)),
        }
        *i += 1;
    }
    tokens
}

// `open` points at the opening parenthesis.
fn parse_group(chars: &[char], open: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut i = open + 1;
    let mut alternatives = Vec::new();
    loop {
        alternatives.push(parse_sequence(chars, &mut i, true));
        match chars.get(i) {
            Some(')') => return Some((alternatives, i + 1)),
            Some('|') => i += 1,
            _ => return None,
        }
    }
}

// `open` points at the opening bracket.
fn parse_class(chars: &[char], open: usize) -> Option<(Token, usize)> {
    let mut i = open + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let mut members = Vec::new();
    let first = i;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && i > first {
            return Some((Token::Class { negated, members }, i + 1));
        }
        if c == '[' && chars.get(i + 1) == Some(&':') {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(end) = rest.find(":]") {
                let name = rest[..end].to_owned();
                i += 2 + name.chars().count() + 2;
                members.push(Member::Named(name));
                continue;
            }
        }
        let low = if c == '\\' {
            i += 1;
            *chars.get(i)?
        } else {
            c
        };
        match (chars.get(i + 1), chars.get(i + 2)) {
            (Some('-'), Some(&high)) if high != ']' => {
                members.push(Member::Range(low, high));
                i += 3;
            }
            _ => {
                members.push(Member::Single(low));
                i += 1;
            }
        }
    }
}

// ------------- Matching -------------
// Backtracking over `*` and groups revisits the same (tokens, text, position)
// states many times, so every outcome is memoized. That keeps a match
// polynomial in the pattern and text lengths.

// A slice is identified by its address and length. Every slice seen during a
// match borrows from the same pattern and text, which outlive the memo.
type Span = (usize, usize);

fn span<T>(slice: &[T]) -> Span {
    (slice.as_ptr() as usize, slice.len())
}

#[derive(PartialEq, Eq, Hash)]
enum State {
    Sequence(Span, Span, usize),
    Repeat(Span, Span, Span, usize, bool),
}

#[derive(Default)]
struct Matcher {
    seen: HashMap<State, bool>,
}

impl Matcher {
    fn any_alternative(&mut self, alternatives: &[Vec<Token>], text: &[char]) -> bool {
        alternatives
            .iter()
            .any(|alternative| self.sequence(alternative, text, 0))
    }

    fn repeat(
        &mut self,
        alternatives: &[Vec<Token>],
        rest: &[Token],
        text: &[char],
        pos: usize,
        at_least_once: bool,
    ) -> bool {
        let state = State::Repeat(span(alternatives), span(rest), span(text), pos, at_least_once);
        if let Some(&known) = self.seen.get(&state) {
            return known;
        }
        let matched = (!at_least_once && self.sequence(rest, text, pos))
            || (pos + 1..=text.len()).any(|end| {
                self.any_alternative(alternatives, &text[pos..end])
                    && self.repeat(alternatives, rest, text, end, false)
            })
            || (at_least_once && self.any_alternative(alternatives, &[]) && self.sequence(rest, text, pos));
        self.seen.insert(state, matched);
        matched
    }

    fn sequence(&mut self, tokens: &[Token], text: &[char], pos: usize) -> bool {
        let state = State::Sequence(span(tokens), span(text), pos);
        if let Some(&known) = self.seen.get(&state) {
            return known;
        }
        let matched = self.step(tokens, text, pos);
        self.seen.insert(state, matched);
        matched
    }

    fn step(&mut self, tokens: &[Token], text: &[char], pos: usize) -> bool {
        let Some((token, rest)) = tokens.split_first() else {
            return pos == text.len();
        };
        match token {
            Token::Literal(c) => text.get(pos) == Some(c) && self.sequence(rest, text, pos + 1),
            Token::AnyChar => pos < text.len() && self.sequence(rest, text, pos + 1),
            Token::AnyString => (pos..=text.len()).any(|next| self.sequence(rest, text, next)),
            Token::Class { negated, members } => match text.get(pos) {
                Some(&c) => {
                    members.iter().any(|m| m.contains(c)) != *negated
                        && self.sequence(rest, text, pos + 1)
                }
                None => false,
            },
            Token::Group {
                repeat,
                alternatives,
            } => match repeat {
                Repeat::ExactlyOne => (pos..=text.len()).any(|end| {
                    self.any_alternative(alternatives, &text[pos..end]) && self.sequence(rest, text, end)
                }),
                Repeat::ZeroOrOne => {
                    self.sequence(rest, text, pos)
                        || (pos..=text.len()).any(|end| {
                            self.any_alternative(alternatives, &text[pos..end])
                                && self.sequence(rest, text, end)
                        })
                }
                Repeat::ZeroOrMore => self.repeat(alternatives, rest, text, pos, false),
                Repeat::OneOrMore => self.repeat(alternatives, rest, text, pos, true),
                Repeat::Not => (pos..=text.len()).any(|end| {
                    !self.any_alternative(alternatives, &text[pos..end]) && self.sequence(rest, text, end)
                }),
            },
        }
    }
}

// ------------- Pattern -------------
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut i = 0;
        let tokens = parse_sequence(&chars, &mut i, false);
        Self {
            source: source.to_owned(),
            tokens,
        }
    }
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        Matcher::default().sequence(&self.tokens, &text, 0)
    }
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
