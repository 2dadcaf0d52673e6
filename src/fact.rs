//! Fact grammar and the hierarchical ordering of fact keys.
//!
//! A fact is either `key` or `key=value`. The key is made of segments joined
//! by `:` (at least one separator is required) and may only use ASCII
//! alphanumerics and `-_:*./`. Everything after the first `=` is the value,
//! which is free text apart from line terminators.
//!
//! Keys are ordered segment-aware and numeric-aware, so that `host:2` sorts
//! before `host:10`, and `a:` sorts before `a:b`.

use std::cmp::Ordering;

use crate::error::{PeekError, Result};

const KEY_PUNCTUATION: &[u8] = b"-_:*./";

/// The identity portion of a fact: everything before the first `=`.
pub fn key(fact: &str) -> &str {
    match fact.find('=') {
        Some(delimiter) => &fact[..delimiter],
        None => fact,
    }
}

/// The value portion of a fact, if any.
pub fn value(fact: &str) -> Option<&str> {
    fact.find('=').map(|delimiter| &fact[delimiter + 1..])
}

pub fn is_valid(fact: &str) -> bool {
    let mut separators = 0;
    for c in key(fact).bytes() {
        if !(c.is_ascii_alphanumeric() || KEY_PUNCTUATION.contains(&c)) {
            return false;
        }
        if c == b':' {
            separators += 1;
        }
    }
    separators != 0 && !fact.contains(['\n', '\r'])
}

pub fn validate(fact: &str) -> Result<&str> {
    if is_valid(fact) {
        Ok(fact)
    } else {
        Err(PeekError::InvalidFact {
            fact: fact.to_owned(),
        })
    }
}

// ------------- Ordering -------------
// The comparison walks both keys at once. An exhausted key sorts first, then a
// separator, then an integer run, and otherwise plain byte order decides.

fn at_end(s: &[u8], i: usize) -> bool {
    i >= s.len() || s[i] == b'='
}

fn starts_integer(s: &[u8], i: usize) -> bool {
    match s.get(i) {
        Some(c) if c.is_ascii_digit() => true,
        Some(b'-') => s.get(i + 1).is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

// Parses the integer run starting at `i`, saturating like strtoll does.
fn integer_run(s: &[u8], mut i: usize) -> (i64, usize) {
    let negative = s[i] == b'-';
    if negative {
        i += 1;
    }
    let mut n: i64 = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        let digit = i64::from(s[i] - b'0');
        n = if negative {
            n.saturating_mul(10).saturating_sub(digit)
        } else {
            n.saturating_mul(10).saturating_add(digit)
        };
        i += 1;
    }
    (n, i)
}

/// Compares two facts by key under the hierarchical natural order.
///
/// Values are never looked at; the scan stops at the first `=`.
pub fn compare(left: &str, right: &str) -> Ordering {
    let (a, b) = (left.as_bytes(), right.as_bytes());
    let (mut i, mut j) = (0, 0);
    loop {
        match (at_end(a, i), at_end(b, j)) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => (),
        }
        match (a[i] == b':', b[j] == b':') {
            (true, true) => {
                i += 1;
                j += 1;
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => (),
        }
        match (starts_integer(a, i), starts_integer(b, j)) {
            (true, true) => {
                let (x, next_i) = integer_run(a, i);
                let (y, next_j) = integer_run(b, j);
                match x.cmp(&y) {
                    Ordering::Equal => {
                        i = next_i;
                        j = next_j;
                        continue;
                    }
                    unequal => return unequal,
                }
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => (),
        }
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            unequal => return unequal,
        }
    }
}
