//! Jokes as the service describes them, and the vocabulary used to filter them.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Joke categories. [`Category::Any`] matches every other category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum Category {
    Any,
    Misc,
    Programming,
    Dark,
    Pun,
    Spooky,
    Christmas,
}

/// Content flags a joke may carry, and which a request may blacklist.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Flag {
    Nsfw,
    Religious,
    Political,
    Racist,
    Sexist,
    Explicit,
}

impl Flag {
    /// Every sensitive flag the service knows about.
    pub const ALL: [Flag; 6] = [
        Flag::Nsfw,
        Flag::Religious,
        Flag::Political,
        Flag::Racist,
        Flag::Sexist,
        Flag::Explicit,
    ];
}

/// Restricts a request to one delivery format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JokeType {
    Single,
    Twopart,
}

/// Languages the service carries jokes in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Cs,
    De,
    #[default]
    En,
    Es,
    Fr,
    Pt,
}

/// Which content flags apply to a joke.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub nsfw: bool,
    pub religious: bool,
    pub political: bool,
    pub racist: bool,
    pub sexist: bool,
    pub explicit: bool,
}

impl Flags {
    pub fn contains(&self, flag: Flag) -> bool {
        match flag {
            Flag::Nsfw => self.nsfw,
            Flag::Religious => self.religious,
            Flag::Political => self.political,
            Flag::Racist => self.racist,
            Flag::Sexist => self.sexist,
            Flag::Explicit => self.explicit,
        }
    }

    /// The flags that are set, in [`Flag::ALL`] order.
    pub fn set(&self) -> Vec<Flag> {
        Flag::ALL
            .into_iter()
            .filter(|flag| self.contains(*flag))
            .collect()
    }
}

/// The text of a joke, in one of its two forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JokeBody {
    #[serde(rename = "single")]
    Single { joke: String },
    #[serde(rename = "twopart")]
    TwoPart { setup: String, delivery: String },
}

/// A single joke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joke {
    pub category: Category,
    #[serde(flatten)]
    pub body: JokeBody,
    pub flags: Flags,
    pub id: u32,
    pub safe: bool,
    pub lang: Language,
}

impl Joke {
    pub fn joke_type(&self) -> JokeType {
        match self.body {
            JokeBody::Single { .. } => JokeType::Single,
            JokeBody::TwoPart { .. } => JokeType::Twopart,
        }
    }
}

/// Single jokes print verbatim; two-part jokes print the setup, a line
/// break, then the delivery.
impl fmt::Display for Joke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            JokeBody::Single { joke } => f.write_str(joke),
            JokeBody::TwoPart { setup, delivery } => write!(f, "{setup}\n{delivery}"),
        }
    }
}

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JokeResponse {
    One(Joke),
    /// A batch, in the order the service returned it.
    Many(Vec<Joke>),
}

impl JokeResponse {
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(jokes) => jokes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn jokes(&self) -> &[Joke] {
        match self {
            Self::One(joke) => std::slice::from_ref(joke),
            Self::Many(jokes) => jokes,
        }
    }

    pub fn into_jokes(self) -> Vec<Joke> {
        match self {
            Self::One(joke) => vec![joke],
            Self::Many(jokes) => jokes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn joke(body: JokeBody) -> Joke {
        Joke {
            category: Category::Pun,
            body,
            flags: Flags::default(),
            id: 7,
            safe: true,
            lang: Language::En,
        }
    }

    #[test]
    fn test_single_formats_verbatim() {
        let single = joke(JokeBody::Single {
            joke: "X".to_string(),
        });
        assert_eq!(single.to_string(), "X");
    }

    #[test]
    fn test_two_part_formats_on_two_lines() {
        let two_part = joke(JokeBody::TwoPart {
            setup: "A".to_string(),
            delivery: "B".to_string(),
        });
        assert_eq!(two_part.to_string(), "A\nB");
    }

    #[test]
    fn test_two_part_is_never_empty() {
        let two_part = joke(JokeBody::TwoPart {
            setup: String::new(),
            delivery: String::new(),
        });
        assert!(!two_part.to_string().is_empty());
    }

    #[test]
    fn test_flag_names() {
        let names = Flag::ALL.iter().map(|f| f.to_string()).collect::<Vec<_>>();
        assert_eq!(
            names,
            ["nsfw", "religious", "political", "racist", "sexist", "explicit"]
        );
        assert_eq!("Programming".parse::<Category>().unwrap(), Category::Programming);
    }

    #[test]
    fn test_decodes_two_part_joke() {
        let json = r#"{
            "category": "Programming",
            "type": "twopart",
            "setup": "Why do programmers prefer dark mode?",
            "delivery": "Because light attracts bugs.",
            "flags": {"nsfw": false, "religious": false, "political": false,
                      "racist": false, "sexist": false, "explicit": true},
            "id": 232,
            "safe": false,
            "lang": "en"
        }"#;

        let joke: Joke = serde_json::from_str(json).unwrap();
        assert_eq!(joke.joke_type(), JokeType::Twopart);
        assert_eq!(joke.flags.set(), vec![Flag::Explicit]);
        assert_eq!(
            joke.to_string(),
            "Why do programmers prefer dark mode?\nBecause light attracts bugs."
        );
    }
}
