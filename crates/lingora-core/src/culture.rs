use serde::Deserialize;

/// Calendar names and AM/PM tokens for one language/region.
///
/// A language tree usually carries this under its `calendar` key, so the
/// struct deserializes straight from that subtree. Every AM/PM variant is
/// optional; accessors fall back to the English tokens the way the date
/// engine expects (`a`/`p`, `am`/`pm`, `A`/`P`, `AM`/`PM`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CultureData {
    pub days: Vec<String>,
    pub days_short: Vec<String>,
    pub months: Vec<String>,
    pub months_short: Vec<String>,
    pub am_lower: Option<String>,
    pub pm_lower: Option<String>,
    pub am_upper: Option<String>,
    pub pm_upper: Option<String>,
    pub am_short_lower: Option<String>,
    pub pm_short_lower: Option<String>,
    pub am_short_upper: Option<String>,
    pub pm_short_upper: Option<String>,
}

impl Default for CultureData {
    fn default() -> Self {
        Self {
            days: names(&[
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
            ]),
            days_short: names(&["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]),
            months: names(&[
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ]),
            months_short: names(&[
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ]),
            am_lower: None,
            pm_lower: None,
            am_upper: None,
            pm_upper: None,
            am_short_lower: None,
            pm_short_lower: None,
            am_short_upper: None,
            pm_short_upper: None,
        }
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| String::from(*value)).collect()
}

impl CultureData {
    pub(crate) fn am_lower(&self) -> &str {
        self.am_lower.as_deref().unwrap_or("am")
    }

    pub(crate) fn pm_lower(&self) -> &str {
        self.pm_lower.as_deref().unwrap_or("pm")
    }

    pub(crate) fn am_upper(&self) -> &str {
        self.am_upper.as_deref().unwrap_or("AM")
    }

    pub(crate) fn pm_upper(&self) -> &str {
        self.pm_upper.as_deref().unwrap_or("PM")
    }

    pub(crate) fn am_short_lower(&self) -> &str {
        self.am_short_lower.as_deref().unwrap_or("a")
    }

    pub(crate) fn pm_short_lower(&self) -> &str {
        self.pm_short_lower.as_deref().unwrap_or("p")
    }

    pub(crate) fn am_short_upper(&self) -> &str {
        self.am_short_upper.as_deref().unwrap_or("A")
    }

    pub(crate) fn pm_short_upper(&self) -> &str {
        self.pm_short_upper.as_deref().unwrap_or("P")
    }
}

/// All lowercase/uppercase spellings of `text`, used to build the AM/PM
/// matching fragments of the date parser. Caseless characters stay fixed, so
/// the result has `2^n` entries where `n` is the number of cased characters.
pub(crate) fn all_case_permutations(text: &str) -> Vec<String> {
    let lower: Vec<String> = text.chars().map(|ch| ch.to_lowercase().to_string()).collect();
    let upper: Vec<String> = text.chars().map(|ch| ch.to_uppercase().to_string()).collect();
    let has_case: Vec<bool> = lower
        .iter()
        .zip(upper.iter())
        .map(|(lo, up)| lo != up)
        .collect();

    let mut results = Vec::new();
    permute(&mut results, &lower, &upper, &has_case, String::new(), 0);
    results
}

fn permute(
    results: &mut Vec<String>,
    lower: &[String],
    upper: &[String],
    has_case: &[bool],
    mut prefix: String,
    mut index: usize,
) {
    while index < lower.len() && !has_case[index] {
        prefix.push_str(&lower[index]);
        index += 1;
    }
    if index == lower.len() {
        results.push(prefix);
        return;
    }
    permute(
        results,
        lower,
        upper,
        has_case,
        format!("{prefix}{}", lower[index]),
        index + 1,
    );
    permute(
        results,
        lower,
        upper,
        has_case,
        format!("{prefix}{}", upper[index]),
        index + 1,
    );
}
