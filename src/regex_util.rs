//! Regex helpers for message content matching and extraction.
//!
//! Patterns given as strings compile with `.` matching newlines. Templates use
//! `$n` for capture group n; unmatched groups substitute as empty.

use std::sync::OnceLock;

use regex::{Captures, Regex, RegexBuilder};

/// Characters [`escape`] prefixes with a backslash
pub const RE_KEYS: &[char] = &[
    '$', '(', ')', '*', '+', '.', '[', ']', '?', '\\', '^', '{', '}', '|',
];

pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).dot_matches_new_line(true).build()
}

/// Group `group` of the first match.
pub fn get(re: &Regex, content: &str, group: usize) -> Option<String> {
    re.captures(content)?
        .get(group)
        .map(|m| m.as_str().to_string())
}

/// Group numbers referenced as `$n`, highest first so `$1` never eats the
/// prefix of `$10`.
fn template_groups(template: &str) -> Vec<usize> {
    let bytes = template.as_bytes();
    let mut groups = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                if let Ok(n) = template[start..end].parse::<usize>() {
                    groups.push(n);
                }
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));
    groups.dedup();
    groups
}

fn fill_template(template: &str, groups: &[usize], caps: &Captures<'_>) -> String {
    let mut out = template.to_string();
    for &n in groups {
        let value = caps.get(n).map_or("", |m| m.as_str());
        out = out.replace(&format!("${n}"), value);
    }
    out
}

/// Fill `template` from the first match, e.g. `"$1-$2"`.
pub fn extract_multi(re: &Regex, content: &str, template: &str) -> Option<String> {
    let caps = re.captures(content)?;
    Some(fill_template(template, &template_groups(template), &caps))
}

/// Like [`extract_multi`], and drop everything up to the end of the match from `content`.
pub fn extract_multi_and_del_pre(
    re: &Regex,
    content: &mut String,
    template: &str,
) -> Option<String> {
    let (filled, end) = {
        let caps = re.captures(content.as_str())?;
        let end = caps.get(0).map_or(0, |m| m.end());
        (fill_template(template, &template_groups(template), &caps), end)
    };
    content.replace_range(..end, "");
    Some(filled)
}

/// Remove the first match.
pub fn del_first(re: &Regex, content: &str) -> String {
    re.replacen(content, 1, regex::NoExpand("")).into_owned()
}

/// Remove everything up to and including the first match.
pub fn del_pre(re: &Regex, content: &str) -> String {
    match re.find(content) {
        Some(m) => content[m.end()..].to_string(),
        None => content.to_string(),
    }
}

/// Group `group` of every match, in order.
pub fn find_all(re: &Regex, content: &str, group: usize) -> Vec<String> {
    re.captures_iter(content)
        .filter_map(|caps| caps.get(group).map(|m| m.as_str().to_string()))
        .collect()
}

/// The content as a number when it is nothing but ASCII digits (one trailing
/// line terminator allowed); 0 otherwise, including on overflow.
pub fn get_first_number(content: &str) -> u64 {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]+)(?:\r\n|[\n\r])?$").ok())
        .as_ref()
        .and_then(|re| get(re, content, 1))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Whole-content match. An empty pattern matches any content; `None` never matches.
pub fn is_match(pattern: &str, content: Option<&str>) -> Result<bool, regex::Error> {
    let Some(content) = content else {
        return Ok(false);
    };
    if pattern.is_empty() {
        return Ok(true);
    }
    let re = Regex::new(&format!("^(?:{pattern})$"))?;
    Ok(re.is_match(content))
}

/// Replace every match, expanding `$n` in `template` per match. The result is
/// taken literally otherwise.
pub fn replace_all(content: &str, re: &Regex, template: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let groups = template_groups(template);
    re.replace_all(content, |caps: &Captures<'_>| fill_template(template, &groups, caps))
        .into_owned()
}

/// Backslash-escape the characters in [`RE_KEYS`].
pub fn escape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for ch in content.chars() {
        if RE_KEYS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Multi-line search anywhere in `content`.
pub fn contains_match(pattern: &str, content: &str) -> Result<bool, regex::Error> {
    let re = RegexBuilder::new(pattern).multi_line(true).build()?;
    Ok(re.is_match(content))
}

/// Common validation patterns.
pub mod patterns {
    pub const IMAGE: &str = r"^(/?\w)+\.(gif|dmp|png|jpg|bmp)$|^\w+\.(gif|dmp|png|jpg|bmp)$";
    pub const EMAIL: &str = r"^([0-9a-zA-Z]([-.\w]*[0-9a-zA-Z])*@(([0-9a-zA-Z])+([-\w]*[0-9a-zA-Z])*\.)+[a-zA-Z]{2,9})$";
    pub const URL: &str = r"^(\w+)://([^/:]+)(:\d*)?([^#\s]*)$";
    /// Octets 0..=255; three-digit octets cannot start with 0
    pub const IPV4: &str = r"^(\d{1,2}|1\d\d|2[0-4]\d|25[0-5])(\.(\d{1,2}|1\d\d|2[0-4]\d|25[0-5])){3}$";
    pub const PHONE: &str = r"^(?:0[0-9]{2,3}[-\s]|\(0[0-9]{2,4}\))[0-9]{6,8}$|^[1-9][0-9]{5,7}$|^[1-9][0-9]{10}$";
    pub const MOBILE: &str = r"^(13[0-9]|14[57]|15[0-35-9]|17[678]|18[0-9])\d{8}$";
    pub const ZIP_CODE: &str = r"^[0-9]{6}$";
    pub const NON_NEGATIVE_INTEGERS: &str = r"^\d+$";
    pub const INTEGERS: &str = r"^-?\d+$";
    pub const POSITIVE_INTEGERS: &str = r"^[1-9]+\d*$";
    pub const NON_POSITIVE_INTEGERS: &str = r"^((-\d+)|(0+))$";
    pub const NON_NEGATIVE_RATIONAL_NUMBERS: &str = r"^\d+(\.\d+)?$";
    pub const NON_POSITIVE_RATIONAL_NUMBERS: &str = r"^((-\d+(\.\d+)?)|(0+(\.0+)?))$";
    pub const RATIONAL_NUMBERS: &str = r"^(-?\d+)(\.\d+)?$";
    pub const ALPHABET: &str = r"^[A-Za-z]+$";
    pub const UPPER_ALPHABET: &str = r"^[A-Z]+$";
    pub const LOWER_ALPHABET: &str = r"^[a-z]+$";
    pub const NUMBER_ALPHABET: &str = r"^[A-Za-z0-9]+$";
    pub const NUMBER_ALPHABET_UNDERLINE: &str = r"^\w+$";
    pub const CHINESE: &str = r"^[\x{4E00}-\x{9FA5}]+$";
    pub const GENERAL_WITH_CHINESE: &str = r"^[\x{4E00}-\x{9FA5}\w]+$";
    pub const UUID: &str = r"^[0-9a-z]{8}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{12}$";
    pub const UUID_SIMPLE: &str = r"^[0-9a-z]{32}$";
}

macro_rules! cached_validator {
    ($(#[$doc:meta])* $name:ident, $pattern:expr) => {
        $(#[$doc])*
        pub fn $name(content: &str) -> bool {
            static RE: OnceLock<Option<Regex>> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).ok())
                .as_ref()
                .is_some_and(|re| re.is_match(content))
        }
    };
}

cached_validator!(is_email, patterns::EMAIL);
cached_validator!(
    /// Mainland China mobile number (11 digits)
    is_mobile,
    patterns::MOBILE
);
cached_validator!(is_ipv4, patterns::IPV4);
cached_validator!(is_zip_code, patterns::ZIP_CODE);
cached_validator!(
    /// Lowercase UUID with or without dashes
    is_uuid,
    r"^[0-9a-z]{8}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{4}-[0-9a-z]{12}$|^[0-9a-z]{32}$"
);
