use serde::{Deserialize, Serialize};

/// One row of the keyword table: any keyword hit assigns `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        KeywordRule {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordTable {
    rules: Vec<KeywordRule>,
}

/// Ordered keyword table. The first rule with a hit wins, so table order
/// is the precedence: software is checked before equipment, meals before
/// travel, fuel before utilities.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule {
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                category: rule.category,
            })
            .collect();
        Self { rules }
    }

    /// Parses a `[[rules]]` table:
    ///
    /// ```toml
    /// [[rules]]
    /// category = "software"
    /// keywords = ["adobe", "github"]
    /// ```
    pub fn from_toml(toml_content: &str) -> Result<Self, toml::de::Error> {
        let table: KeywordTable = toml::from_str(toml_content)?;
        Ok(Self::new(table.rules))
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn match_category(&self, description: &str) -> Option<&str> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| contains_keyword(&text, k)))
            .map(|rule| rule.category.as_str())
    }
}

/// Substring hit that is not immediately followed by a lowercase letter,
/// so "mobil" does not fire inside "mobile". The left side is unguarded.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(start, _)| {
        text[start + keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_lowercase())
    })
}

pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(
            "advertising",
            &["facebk", "facebook ads", "google ads", "linkedin ads", "meta ads", "yelp ads"],
        ),
        KeywordRule::new(
            "software",
            &[
                "adobe", "microsoft", "github", "google workspace", "gsuite", "dropbox", "slack",
                "zoom.us", "atlassian", "notion", "figma", "intuit", "quickbooks",
                "amazon web services", "aws.amazon", "digitalocean", "heroku", "vercel", "openai",
                "canva", "mailchimp", "hubspot", "salesforce", "shopify", "squarespace",
                "godaddy", "namecheap", "1password", "docusign", "calendly", "zapier", "software",
            ],
        ),
        KeywordRule::new(
            "equipment",
            &[
                "apple store", "best buy", "bestbuy", "dell", "lenovo", "newegg", "b&h photo",
                "laptop", "computer", "monitor", "printer", "equipment",
            ],
        ),
        KeywordRule::new(
            "meals",
            &[
                "starbucks", "uber eats", "doordash", "grubhub", "postmates", "chipotle",
                "mcdonald", "dunkin", "panera", "sweetgreen", "restaurant", "cafe", "coffee",
                "pizza", "bistro", "diner", "grill",
            ],
        ),
        KeywordRule::new(
            "travel",
            &[
                "uber", "lyft", "airbnb", "delta air", "united airlines", "american airlines",
                "southwest air", "marriott", "hilton", "hyatt", "expedia", "amtrak", "hotel",
                "airline",
            ],
        ),
        KeywordRule::new(
            "fuel",
            &[
                "shell", "chevron", "exxon", "mobil", "texaco", "sunoco", "valero", "citgo",
                "arco", "gas station", "fuel",
            ],
        ),
        KeywordRule::new(
            "utilities",
            &[
                "verizon", "at&t", "t-mobile", "comcast", "xfinity", "spectrum", "pg&e",
                "phone", "wireless", "internet", "electric", "water", "utility",
            ],
        ),
        KeywordRule::new(
            "office_supplies",
            &["staples", "office depot", "officemax", "usps", "fedex", "ups store"],
        ),
        KeywordRule::new(
            "insurance",
            &["geico", "state farm", "progressive", "allstate", "insurance"],
        ),
        KeywordRule::new(
            "bank_fees",
            &[
                "service fee", "monthly fee", "maintenance fee", "overdraft", "nsf fee",
                "wire fee", "atm fee",
            ],
        ),
        KeywordRule::new("payroll", &["gusto", "adp", "paychex", "payroll"]),
        KeywordRule::new("taxes", &["irs", "usataxpymt", "franchise tax", "state tax"]),
        KeywordRule::new(
            "professional_services",
            &["attorney", "legal", "cpa", "accounting", "consulting"],
        ),
        KeywordRule::new(
            "retail",
            &["amazon", "amzn", "walmart", "target", "costco", "home depot", "lowes", "ebay"],
        ),
        KeywordRule::new("income", &["stripe", "square inc", "client payment", "invoice"]),
        KeywordRule::new(
            "transfer",
            &["transfer", "xfer", "to savings", "from savings", "to checking", "from checking"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(desc: &str) -> Option<String> {
        KeywordClassifier::default()
            .match_category(desc)
            .map(str::to_string)
    }

    #[test]
    fn match_is_case_insensitive() {
        assert_eq!(classify("STARBUCKS #123").as_deref(), Some("meals"));
    }

    #[test]
    fn statement_samples_categorize() {
        let classifier = KeywordClassifier::default();
        let descriptions = ["STARBUCKS #123", "UBER EATS ORDER 456", "ACH TRANSFER TO SAVINGS"];
        let categories: Vec<Option<&str>> = descriptions
            .iter()
            .map(|d| classifier.match_category(d))
            .collect();
        assert_eq!(categories, vec![Some("meals"), Some("meals"), Some("transfer")]);
    }

    #[test]
    fn earlier_group_wins_when_two_groups_hit() {
        // "microsoft" is software, "laptop" is equipment; software is checked first.
        assert_eq!(classify("MICROSOFT SURFACE LAPTOP").as_deref(), Some("software"));
        // "uber eats" sits in meals, ahead of plain "uber" in travel.
        assert_eq!(classify("UBER EATS 8841").as_deref(), Some("meals"));
        assert_eq!(classify("UBER TRIP 8841").as_deref(), Some("travel"));
    }

    #[test]
    fn reordering_the_table_changes_the_winner() {
        let software_first = KeywordClassifier::new(vec![
            KeywordRule::new("software", &["adobe"]),
            KeywordRule::new("equipment", &["printer"]),
        ]);
        let equipment_first = KeywordClassifier::new(vec![
            KeywordRule::new("equipment", &["printer"]),
            KeywordRule::new("software", &["adobe"]),
        ]);
        let desc = "ADOBE PRINTER DRIVER";
        assert_eq!(software_first.match_category(desc), Some("software"));
        assert_eq!(equipment_first.match_category(desc), Some("equipment"));
    }

    #[test]
    fn mobil_does_not_fire_inside_mobile() {
        assert_ne!(classify("mobile phone bill").as_deref(), Some("fuel"));
        assert_eq!(classify("mobile phone bill").as_deref(), Some("utilities"));
        assert_eq!(classify("MOBIL 0042 HOUSTON TX").as_deref(), Some("fuel"));
    }

    #[test]
    fn guard_checks_every_occurrence() {
        let c = KeywordClassifier::new(vec![KeywordRule::new("fuel", &["mobil"])]);
        assert_eq!(c.match_category("mobile top-up at mobil"), Some("fuel"));
        assert_eq!(c.match_category("mobile mobiles"), None);
    }

    #[test]
    fn keyword_followed_by_digit_or_punctuation_matches() {
        let c = KeywordClassifier::new(vec![KeywordRule::new("fuel", &["shell"])]);
        assert_eq!(c.match_category("shell123"), Some("fuel"));
        assert_eq!(c.match_category("shell*oil"), Some("fuel"));
        assert_eq!(c.match_category("shellfish shack"), None);
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(classify("ZXQV HOLDINGS"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn from_toml_preserves_order_and_lowercases() {
        let toml = r#"
            [[rules]]
            category = "equipment"
            keywords = ["PRINTER"]

            [[rules]]
            category = "software"
            keywords = ["Adobe", ""]
        "#;
        let c = KeywordClassifier::from_toml(toml).unwrap();
        assert_eq!(c.rules().len(), 2);
        assert_eq!(c.rules()[1].keywords, vec!["adobe".to_string()]);
        assert_eq!(c.match_category("adobe printer"), Some("equipment"));
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(KeywordClassifier::from_toml("rules = 5").is_err());
    }
}
