//! Challenge question resolution.
//!
//! The portal presents a personal verification question mid-login. Answers
//! come either from a configuration-supplied map or from the loaded secret
//! provider; the mode is fixed at startup, never chosen per call.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::provider::SecretProvider;

/// Normalized lookup key for a displayed question: surrounding whitespace
/// trimmed, case folded to lowercase. Map construction and lookup must use
/// the same rule or legitimate questions spuriously fail to resolve.
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct AnswerDocument {
    #[serde(default)]
    questions: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    #[serde(default)]
    text: String,
    #[serde(default)]
    answer: String,
}

/// Immutable map from normalized question text to answer.
///
/// Built once from configuration; entries with an empty question or answer
/// are dropped during construction, never rejected lazily at lookup time.
#[derive(Debug, Clone)]
pub struct ChallengeAnswerMap {
    answers: HashMap<String, String>,
}

impl ChallengeAnswerMap {
    /// Build from the serialized `{"questions": [{"text", "answer"}]}` form.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: AnswerDocument = serde_json::from_str(raw).map_err(|err| {
            Error::configuration(format!("challenge answer map is not valid JSON: {err}"))
        })?;
        Ok(Self::from_entries(
            document.questions.into_iter().map(|e| (e.text, e.answer)),
        ))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut answers = HashMap::new();
        for (text, answer) in entries {
            if text.trim().is_empty() || answer.is_empty() {
                continue;
            }
            answers.insert(normalize(&text), answer);
        }
        Self { answers }
    }

    pub fn lookup(&self, question: &str) -> Option<&str> {
        self.answers.get(&normalize(question)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// How challenge questions are answered. Fixed at startup; the two modes are
/// mutually exclusive.
pub enum ChallengeResolver {
    /// Exact-match lookup of the normalized question in a static map.
    StaticMap(ChallengeAnswerMap),
    /// Forward the raw, non-normalized question to the secret provider.
    Delegating,
}

impl ChallengeResolver {
    pub async fn resolve(
        &self,
        question: &str,
        provider: &dyn SecretProvider,
    ) -> Result<SecretString> {
        match self {
            ChallengeResolver::StaticMap(map) => map
                .lookup(question)
                .map(|answer| SecretString::from(answer.to_string()))
                .ok_or_else(|| Error::UnknownChallenge {
                    question: question.to_string(),
                }),
            ChallengeResolver::Delegating => {
                let answer = provider.get_2fa_answer(question).await?;
                if answer.expose_secret().is_empty() {
                    return Err(Error::UnknownChallenge {
                        question: question.to_string(),
                    });
                }
                Ok(answer)
            }
        }
    }
}
