use std::time::Duration;

use url::Url;

use crate::joke::Category;
use crate::joke::Flag;
use crate::joke::JokeType;
use crate::joke::Language;

/// Largest batch the service hands out in one response.
pub const MAX_AMOUNT: u8 = 10;

/// Describes which jokes a fetch asks for.
///
/// Every field is optional. Unset fields are left out of the request and
/// the service applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Requested categories, in order. Empty means [`Category::Any`].
    pub categories: Vec<Category>,
    pub lang: Option<Language>,
    /// Flags to exclude, in order.
    pub blacklist_flags: Vec<Flag>,
    pub joke_type: Option<JokeType>,
    /// Only jokes containing this text. Sent form encoded, so spaces
    /// travel as `+`.
    pub contains: Option<String>,
    /// Inclusive range of joke ids.
    pub id_range: Option<(u32, u32)>,
    /// Number of jokes, clamped to `1..=10`.
    pub amount: Option<u8>,
    /// Overrides the client's default time budget for this call.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that exclude every sensitive flag.
    pub fn safe() -> Self {
        Self::new().with_blacklist_flags(Flag::ALL)
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories = vec![category];
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_lang(mut self, lang: Language) -> Self {
        self.lang = Some(lang);
        self
    }

    pub fn with_blacklist_flags(mut self, flags: impl IntoIterator<Item = Flag>) -> Self {
        self.blacklist_flags = flags.into_iter().collect();
        self
    }

    pub fn with_joke_type(mut self, joke_type: JokeType) -> Self {
        self.joke_type = Some(joke_type);
        self
    }

    pub fn with_contains(mut self, text: impl Into<String>) -> Self {
        self.contains = Some(text.into());
        self
    }

    pub fn with_id_range(mut self, from: u32, to: u32) -> Self {
        self.id_range = Some((from, to));
        self
    }

    pub fn with_amount(mut self, amount: u8) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The amount that will actually be requested.
    pub fn effective_amount(&self) -> u8 {
        self.amount.unwrap_or(1).clamp(1, MAX_AMOUNT)
    }

    /// The category path segment: a comma separated list in caller order.
    pub fn category_segment(&self) -> String {
        if self.categories.is_empty() || self.categories.contains(&Category::Any) {
            return Category::Any.to_string();
        }
        join(&self.categories)
    }

    /// Query parameters in emission order. Absent options produce nothing.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(lang) = self.lang {
            pairs.push(("lang", lang.to_string()));
        }
        if !self.blacklist_flags.is_empty() {
            pairs.push(("blacklistFlags", join(&self.blacklist_flags)));
        }
        if let Some(joke_type) = self.joke_type {
            pairs.push(("type", joke_type.to_string()));
        }
        if let Some(text) = self.contains.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("contains", text.to_string()));
        }
        if let Some((from, to)) = self.id_range {
            let (lo, hi) = (from.min(to), from.max(to));
            let range = if lo == hi {
                lo.to_string()
            } else {
                format!("{lo}-{hi}")
            };
            pairs.push(("idRange", range));
        }
        let amount = self.effective_amount();
        if amount > 1 {
            pairs.push(("amount", amount.to_string()));
        }

        pairs
    }

    /// Builds `<base>/joke/<categories>?<query>` for these options.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("joke")
                .push(&self.category_segment());
        }

        let pairs = self.query_pairs();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url
    }
}

fn join<T: AsRef<str>>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}
