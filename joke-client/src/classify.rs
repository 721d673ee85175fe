//! Turns a completed round trip into exactly one outcome.
//!
//! The checks run in a fixed order: transport status first, then the
//! service's own error envelope, then decoding of the joke payload. A
//! decoded joke must have text to print.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::JokeError;
use crate::joke::Joke;
use crate::joke::JokeBody;
use crate::joke::JokeResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    code: i64,
    message: String,
    #[serde(default)]
    causes: Vec<String>,
    additional_info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Batch {
    jokes: Vec<Joke>,
}

/// Classifies a response from its status and raw body.
pub fn classify(status: StatusCode, body: &[u8]) -> Result<JokeResponse, JokeError> {
    if !status.is_success() {
        return Err(JokeError::Transport {
            message: format!("JokeAPI answered with status {status}"),
            status: Some(status.as_u16()),
        });
    }

    let payload: Value = serde_json::from_slice(body).map_err(|e| undecodable(status, e))?;

    if payload.get("error").and_then(Value::as_bool).unwrap_or(false) {
        let envelope: ErrorEnvelope =
            serde_json::from_value(payload).map_err(|e| undecodable(status, e))?;
        return Err(JokeError::Domain {
            code: envelope.code,
            message: envelope.message,
            causes: envelope.causes,
            additional_info: envelope.additional_info,
        });
    }

    let response = if payload.get("jokes").is_some() {
        let batch: Batch = serde_json::from_value(payload).map_err(|e| undecodable(status, e))?;
        JokeResponse::Many(batch.jokes)
    } else {
        let joke: Joke = serde_json::from_value(payload).map_err(|e| undecodable(status, e))?;
        JokeResponse::One(joke)
    };

    // Every joke handed out must have something to print
    if let Some(joke) = response.jokes().iter().find(|joke| is_blank(joke)) {
        return Err(JokeError::Transport {
            message: format!("Undecodable JokeAPI payload: joke {} has no text", joke.id),
            status: Some(status.as_u16()),
        });
    }

    Ok(response)
}

fn is_blank(joke: &Joke) -> bool {
    match &joke.body {
        JokeBody::Single { joke } => joke.is_empty(),
        JokeBody::TwoPart { setup, delivery } => setup.is_empty() && delivery.is_empty(),
    }
}

fn undecodable(status: StatusCode, err: serde_json::Error) -> JokeError {
    JokeError::Transport {
        message: format!("Undecodable JokeAPI payload: {err}"),
        status: Some(status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::joke::Category;

    const SINGLE: &str = r#"{
        "error": false,
        "category": "Programming",
        "type": "single",
        "joke": "There are 10 kinds of people.",
        "flags": {"nsfw": false, "religious": false, "political": false,
                  "racist": false, "sexist": false, "explicit": false},
        "id": 12,
        "safe": true,
        "lang": "en"
    }"#;

    #[test]
    fn test_single_joke() {
        let response = classify(StatusCode::OK, SINGLE.as_bytes()).unwrap();

        let JokeResponse::One(joke) = response else {
            panic!("expected a single joke");
        };
        assert_eq!(joke.category, Category::Programming);
        assert_eq!(joke.id, 12);
        assert_eq!(
            joke.body,
            JokeBody::Single {
                joke: "There are 10 kinds of people.".to_string()
            }
        );
    }

    #[test]
    fn test_batch() {
        let body = r#"{
            "error": false,
            "amount": 2,
            "jokes": [
                {"category": "Pun", "type": "single", "joke": "one",
                 "flags": {"nsfw": false, "religious": false, "political": false,
                           "racist": false, "sexist": false, "explicit": false},
                 "id": 1, "safe": true, "lang": "en"},
                {"category": "Misc", "type": "twopart", "setup": "two", "delivery": "three",
                 "flags": {"nsfw": false, "religious": false, "political": false,
                           "racist": false, "sexist": false, "explicit": false},
                 "id": 2, "safe": true, "lang": "en"}
            ]
        }"#;

        let response = classify(StatusCode::OK, body.as_bytes()).unwrap();
        let texts = response
            .jokes()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        assert_eq!(texts, ["one", "two\nthree"]);
    }

    #[test]
    fn test_domain_error() {
        let body = r#"{
            "error": true,
            "internalError": false,
            "code": 106,
            "message": "No matching joke found",
            "causes": ["No jokes were found that match your provided filter(s)."],
            "additionalInfo": "Try relaxing your filters.",
            "timestamp": 1579170794412
        }"#;

        assert_eq!(
            classify(StatusCode::OK, body.as_bytes()),
            Err(JokeError::Domain {
                code: 106,
                message: "No matching joke found".to_string(),
                causes: vec!["No jokes were found that match your provided filter(s).".to_string()],
                additional_info: Some("Try relaxing your filters.".to_string()),
            })
        );
    }

    #[test]
    fn test_non_success_status_wins_over_body() {
        let err = classify(StatusCode::SERVICE_UNAVAILABLE, SINGLE.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            JokeError::Transport {
                status: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_body_is_transport() {
        let err = classify(StatusCode::OK, b"<html>oops</html>").unwrap_err();

        assert!(matches!(
            err,
            JokeError::Transport {
                status: Some(200),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_single_joke_is_transport() {
        let body = SINGLE.replace("There are 10 kinds of people.", "");
        let err = classify(StatusCode::OK, body.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            JokeError::Transport {
                status: Some(200),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_two_part_joke_in_batch_is_transport() {
        let body = r#"{
            "error": false,
            "amount": 2,
            "jokes": [
                {"category": "Pun", "type": "single", "joke": "fine",
                 "flags": {"nsfw": false, "religious": false, "political": false,
                           "racist": false, "sexist": false, "explicit": false},
                 "id": 1, "safe": true, "lang": "en"},
                {"category": "Misc", "type": "twopart", "setup": "", "delivery": "",
                 "flags": {"nsfw": false, "religious": false, "political": false,
                           "racist": false, "sexist": false, "explicit": false},
                 "id": 2, "safe": true, "lang": "en"}
            ]
        }"#;

        assert!(classify(StatusCode::OK, body.as_bytes()).is_err());
    }

    #[test]
    fn test_half_empty_two_part_joke_is_kept() {
        let body = r#"{
            "category": "Misc", "type": "twopart", "setup": "Knock knock.", "delivery": "",
            "flags": {"nsfw": false, "religious": false, "political": false,
                      "racist": false, "sexist": false, "explicit": false},
            "id": 3, "safe": true, "lang": "en"
        }"#;

        let response = classify(StatusCode::OK, body.as_bytes()).unwrap();
        assert_eq!(response.jokes()[0].to_string(), "Knock knock.\n");
    }
}
