use std::sync::OnceLock;

use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_url, r"(?:https?://|www\.)\S+");
// Keeps the registrable label: "netflix.com/bill" -> "netflix".
re!(re_domain, r"\b([a-z0-9][a-z0-9-]*)\.(?:com|net|org|io|co|us|biz|info|app|ai)\b\S*");
re!(re_ach_meta,
    r"\b(?:co\s+id|co\s+name|entry\s+descr|ind\s+name|indn|des|id|conf|trn|ref|srf|imad|omad|bnf|obi|ppd\s+id|web\s+id)\s*[:#]\s*\S*");
// A reference token carries a digit; "sq *blue" keeps the merchant word.
re!(re_reference, r"[*#][a-z]*\d[a-z0-9\-]*");
re!(re_date_iso, r"\b\d{4}-\d{2}-\d{2}\b");
re!(re_date_slash, r"\b\d{1,2}[/\-]\d{1,2}(?:[/\-]\d{2,4})?\b");
re!(re_amount, r"\$\s*\d[\d,]*(?:\.\d{2})?|\b\d[\d,]*\.\d{2}\b");
re!(re_phone, r"\(?\b\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}\b");
re!(re_long_digits, r"\d{4,}");
re!(re_non_alpha, r"[^a-z\s]");
re!(re_whitespace, r"\s+");

/// Words a bank puts in front of the merchant name.
const BANK_PREFIXES: &[&str] = &[
    "purchase",
    "authorized",
    "on",
    "checkcard",
    "check",
    "card",
    "pos",
    "debit",
    "credit",
    "dbt",
    "crd",
    "ach",
    "recurring",
    "preauthorized",
    "online",
    "electronic",
    "withdrawal",
    "visa",
    "mc",
    "payment",
    "pmt",
];

/// Card-processor tags in front of the merchant ("SQ *", "TST*", "PP*").
const PROCESSOR_PREFIXES: &[&str] = &["sq", "tst", "pp", "sp", "py", "ckc"];

/// Leftovers of ACH/wire metadata once the punctuation is gone.
const METADATA_TOKENS: &[&str] = &["ppd", "ccd", "ctx", "des", "indn", "tel"];

const MONTHS: &[&str] = &[
    "jan", "january", "feb", "february", "mar", "march", "apr", "april", "may", "jun", "june",
    "jul", "july", "aug", "august", "sep", "sept", "september", "oct", "october", "nov",
    "november", "dec", "december",
];

const US_STATES: &[&str] = &[
    "al", "ak", "az", "ar", "ca", "co", "ct", "de", "dc", "fl", "ga", "hi", "id", "il", "in",
    "ia", "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh",
    "nj", "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut",
    "vt", "va", "wa", "wv", "wi", "wy",
];

/// Reduce a raw bank description to a stable merchant key.
///
/// The result only contains lowercase ASCII letters separated by single
/// spaces, so running it again is a no-op. An empty string means the
/// description had nothing merchant-like left in it.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.to_lowercase();

    for (re, replacement) in [
        (re_url(), " "),
        (re_domain(), " $1 "),
        (re_ach_meta(), " "),
        (re_reference(), " "),
        (re_date_iso(), " "),
        (re_date_slash(), " "),
        (re_amount(), " "),
        (re_phone(), " "),
        (re_long_digits(), " "),
    ] {
        s = re.replace_all(&s, replacement).into_owned();
    }

    let s = re_non_alpha().replace_all(&s, "");
    let s = re_whitespace().replace_all(s.trim(), " ");

    let mut words: Vec<&str> = s
        .split(' ')
        .filter(|w| !w.is_empty())
        .filter(|w| !MONTHS.contains(w) && !METADATA_TOKENS.contains(w))
        .collect();

    let leading = words
        .iter()
        .take_while(|w| BANK_PREFIXES.contains(*w) || PROCESSOR_PREFIXES.contains(*w))
        .count();
    words.drain(..leading);

    while words.len() > 1 && words.last().is_some_and(|w| US_STATES.contains(w)) {
        words.pop();
    }

    words.join(" ")
}

/// Whitespace tokens of an already-normalized string.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}
