/*
 * @file intent.rs
 * @brief Intent resolution from conversation replies
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Intent resolution from conversation backend replies.

use std::fmt;

/// Symbolic action a conversation turn can lead to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    TranslateSetup,
    TranslatePhrase,
    ToneAnalysis,
    SentimentSearch,
    CollectZip,
    Weather,
    GolfWeather,
    News,
    CollectLanguage,
    TakePicture,
    Sleep,
    DiscoParty,
    Goodbye,
    None,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Trigger phrase paired with the intent it selects.
///
/// # Details
/// Phrases are matched as lowercase substrings of the backend reply.
#[derive(Clone, Copy, Debug)]
pub struct IntentPhrase {
    /// Lowercase phrase searched for in the reply.
    pub phrase: &'static str,
    /// Intent chosen when the phrase is present.
    pub intent: Intent,
    /// What the phrase asks the assistant to do, for the backend prompt.
    pub description: &'static str,
}

/// Ordered trigger table. Order matters: phrases are not disjoint and the
/// first hit wins.
const PHRASES: &[IntentPhrase] = &[
    IntentPhrase {
        phrase: "twitter sentiment analysis",
        intent: Intent::SentimentSearch,
        description: "ask which keyword to run twitter sentiment analysis on",
    },
    IntentPhrase {
        phrase: "tone analyzer",
        intent: Intent::ToneAnalysis,
        description: "ask the user to speak a phrase for the tone analyzer",
    },
    IntentPhrase {
        phrase: "the united states zip code",
        intent: Intent::CollectZip,
        description: "ask for the united states zip code to use",
    },
    IntentPhrase {
        phrase: "the current weather at",
        intent: Intent::Weather,
        description: "report the current weather at the user's zip code",
    },
    IntentPhrase {
        phrase: "a nice day to play golf",
        intent: Intent::GolfWeather,
        description: "check whether it is a nice day to play golf",
    },
    IntentPhrase {
        phrase: "latest news",
        intent: Intent::News,
        description: "read the latest news headlines",
    },
    IntentPhrase {
        phrase: "what language to translate",
        intent: Intent::CollectLanguage,
        description: "ask what language to translate into",
    },
    IntentPhrase {
        phrase: "translate to",
        intent: Intent::TranslateSetup,
        description: "confirm the language to translate to, naming it",
    },
    IntentPhrase {
        phrase: "a picture",
        intent: Intent::TakePicture,
        description: "take a picture and describe it",
    },
    IntentPhrase {
        phrase: "robot is going to sleep",
        intent: Intent::Sleep,
        description: "announce that the robot is going to sleep for a minute",
    },
    IntentPhrase {
        phrase: "disco party",
        intent: Intent::DiscoParty,
        description: "start a disco party",
    },
    IntentPhrase {
        phrase: "goodbye",
        intent: Intent::Goodbye,
        description: "say goodbye and shut down",
    },
];

/// Maps backend reply text to a single [`Intent`].
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentResolver;

impl IntentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the intent carried by a backend reply.
    ///
    /// # Details
    /// Scans the trigger table in order against the lowercased reply and stops
    /// at the first phrase found.
    ///
    /// # Arguments
    /// * `description` - The reply text returned for this turn.
    ///
    /// # Returns
    /// * `None` - The reply is empty, so the turn has nothing to act on.
    /// * `Some(Intent::None)` - The reply matched no trigger phrase.
    /// * `Some(intent)` - The first matching intent.
    pub fn resolve(&self, description: &str) -> Option<Intent> {
        if description.trim().is_empty() {
            return None;
        }
        let normalized = description.to_lowercase();
        let intent = PHRASES
            .iter()
            .find(|entry| normalized.contains(entry.phrase))
            .map_or(Intent::None, |entry| entry.intent);
        Some(intent)
    }

    /// Returns the trigger table in evaluation order.
    pub fn phrases(&self) -> &'static [IntentPhrase] {
        PHRASES
    }

    /// Renders the trigger table as instructions for a conversation backend.
    ///
    /// # Details
    /// An LLM backend only produces actionable replies when it knows the exact
    /// phrases, so each one is listed with the situation it belongs to.
    ///
    /// # Returns
    /// * `String` - One bullet per trigger phrase.
    pub fn phrase_catalog(&self) -> String {
        let mut result = String::from("Trigger phrases (include the quoted words verbatim):\n");
        for entry in PHRASES {
            result.push_str(&format!("- \"{}\": {}\n", entry.phrase, entry.description));
        }
        result
    }
}
