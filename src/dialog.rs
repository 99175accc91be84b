/*
 * @file dialog.rs
 * @brief Multi-turn dialog state for intentbot
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

//! Multi-turn dialog state.

use crate::intent::Intent;
use crate::services::{Gender, VoiceProfile};

/// Translation target the assistant knows how to speak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Language {
    /// Lowercase English name listened for, e.g. `"spanish"`.
    pub name: &'static str,
    /// Translation language code.
    pub code: &'static str,
    /// Speech locale used to read the translation aloud.
    pub locale: &'static str,
    pub gender: Gender,
}

impl Language {
    pub fn voice(&self) -> VoiceProfile {
        VoiceProfile::new(self.locale, self.gender)
    }

    /// Name with the first letter capitalised, for speaking.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

pub const LANGUAGES: &[Language] = &[
    Language { name: "arabic", code: "ar", locale: "ar-AE", gender: Gender::Female },
    Language { name: "chinese", code: "zh", locale: "zh-CH", gender: Gender::Female },
    Language { name: "german", code: "de", locale: "de-DE", gender: Gender::Male },
    Language { name: "french", code: "fr", locale: "fr-FR", gender: Gender::Female },
    Language { name: "italian", code: "it", locale: "it-IT", gender: Gender::Female },
    Language { name: "japanese", code: "ja", locale: "ja-JP", gender: Gender::Female },
    Language { name: "korean", code: "ko", locale: "ko-KO", gender: Gender::Female },
    Language { name: "spanish", code: "es", locale: "es-ES", gender: Gender::Male },
    Language { name: "portuguese", code: "pt", locale: "pt-BR", gender: Gender::Female },
];

/// Language translations go to until the user picks another one.
pub const DEFAULT_LANGUAGE: Language = LANGUAGES[7];

/// Finds the first known language mentioned in `text`.
pub fn find_language(text: &str) -> Option<Language> {
    let normalized = text.to_lowercase();
    LANGUAGES
        .iter()
        .find(|language| normalized.contains(language.name))
        .copied()
}

/// Looks a language up by its translation code.
pub fn language_by_code(code: &str) -> Option<Language> {
    LANGUAGES.iter().find(|language| language.code == code).copied()
}

/// Action that runs once a collected zip code arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZipFollowUp {
    Weather,
    GolfWeather,
    /// Hand the code back to the conversation backend and act on its reply.
    Converse,
}

/// The single piece of follow-up input currently being collected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Awaiting {
    #[default]
    None,
    Language,
    TranslationPhrase,
    TonePhrase,
    Zip(ZipFollowUp),
    SentimentKeyword,
}

impl Awaiting {
    /// Action unlocked once the awaited input arrives.
    pub fn pending_intent(self) -> Intent {
        match self {
            Awaiting::None => Intent::None,
            Awaiting::Language => Intent::TranslateSetup,
            Awaiting::TranslationPhrase => Intent::TranslatePhrase,
            Awaiting::TonePhrase => Intent::ToneAnalysis,
            Awaiting::Zip(ZipFollowUp::Weather) => Intent::Weather,
            Awaiting::Zip(ZipFollowUp::GolfWeather) => Intent::GolfWeather,
            Awaiting::Zip(ZipFollowUp::Converse) => Intent::CollectZip,
            Awaiting::SentimentKeyword => Intent::SentimentSearch,
        }
    }
}

/// Process-lifetime record of what the dialog is waiting for.
#[derive(Clone, Debug)]
pub struct DialogState {
    awaiting: Awaiting,
    target_language: Language,
    last_zip: Option<String>,
    halted: bool,
}

impl Default for DialogState {
    fn default() -> Self {
        Self {
            awaiting: Awaiting::None,
            target_language: DEFAULT_LANGUAGE,
            last_zip: None,
            halted: false,
        }
    }
}

impl DialogState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn awaiting(&self) -> Awaiting {
        self.awaiting
    }

    pub fn is_idle(&self) -> bool {
        self.awaiting == Awaiting::None
    }

    /// Starts collecting `awaiting`, replacing whatever was pending.
    pub fn expect(&mut self, awaiting: Awaiting) {
        self.awaiting = awaiting;
    }

    /// Clears the pending collection and returns it.
    ///
    /// # Details
    /// Called before the collected input is used, so nothing a turn does
    /// afterwards can observe a stale collection.
    pub fn take_awaiting(&mut self) -> Awaiting {
        std::mem::take(&mut self.awaiting)
    }

    pub fn target_language(&self) -> Language {
        self.target_language
    }

    pub fn target_voice_gender(&self) -> Gender {
        self.target_language.gender
    }

    pub fn set_target_language(&mut self, language: Language) {
        self.target_language = language;
    }

    pub fn last_zip(&self) -> Option<&str> {
        self.last_zip.as_deref()
    }

    pub fn remember_zip(&mut self, zip: impl Into<String>) {
        self.last_zip = Some(zip.into());
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Marks the dialog finished; no further turns are processed.
    pub fn halt(&mut self) {
        self.awaiting = Awaiting::None;
        self.halted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_spanish_target() {
        let state = DialogState::new();
        assert!(state.is_idle());
        assert_eq!(state.target_language().code, "es");
        assert_eq!(state.target_voice_gender(), Gender::Male);
        assert_eq!(state.last_zip(), None);
        assert!(!state.is_halted());
    }

    #[test]
    fn take_awaiting_resets_to_idle() {
        let mut state = DialogState::new();
        state.expect(Awaiting::Zip(ZipFollowUp::Weather));
        assert_eq!(state.take_awaiting(), Awaiting::Zip(ZipFollowUp::Weather));
        assert!(state.is_idle());
        assert_eq!(state.take_awaiting(), Awaiting::None);
    }

    #[test]
    fn a_new_collection_replaces_the_old_one() {
        let mut state = DialogState::new();
        state.expect(Awaiting::Language);
        state.expect(Awaiting::SentimentKeyword);
        assert_eq!(state.awaiting(), Awaiting::SentimentKeyword);
    }

    #[test]
    fn pending_intents_match_collections() {
        assert_eq!(Awaiting::TranslationPhrase.pending_intent(), Intent::TranslatePhrase);
        assert_eq!(Awaiting::SentimentKeyword.pending_intent(), Intent::SentimentSearch);
        assert_eq!(Awaiting::Zip(ZipFollowUp::GolfWeather).pending_intent(), Intent::GolfWeather);
        assert_eq!(Awaiting::None.pending_intent(), Intent::None);
    }

    #[test]
    fn finds_languages_by_name() {
        assert_eq!(find_language("Translate to FRENCH please").map(|l| l.code), Some("fr"));
        assert_eq!(find_language("klingon"), None);
        assert_eq!(language_by_code("ja").map(|l| l.locale), Some("ja-JP"));
        assert_eq!(DEFAULT_LANGUAGE.display_name(), "Spanish");
    }

    #[test]
    fn halt_clears_pending_input() {
        let mut state = DialogState::new();
        state.expect(Awaiting::TonePhrase);
        state.halt();
        assert!(state.is_halted());
        assert!(state.is_idle());
    }
}
