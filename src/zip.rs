/*
 * @file zip.rs
 * @brief Spoken postal code parsing
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

//! Spoken postal code parsing.

use tracing::warn;

/// Number of digits in a US postal code.
const ZIP_LEN: usize = 5;

/// Converts a run of spoken number-words into a 5-digit postal code.
///
/// # Details
/// Recognises the words `zero` through `nine` (plus `oh`/`o` for zero) and
/// tokens that are already digits, which is how Whisper sometimes renders the
/// same utterance. Anything else stops the run; when fewer than five digits
/// were collected the configured default code is returned instead.
#[derive(Clone, Debug)]
pub struct ZipWordParser {
    default_zip: String,
}

impl ZipWordParser {
    pub fn new(default_zip: impl Into<String>) -> Self {
        Self {
            default_zip: default_zip.into(),
        }
    }

    /// Returns the code used whenever parsing falls short.
    pub fn default_zip(&self) -> &str {
        &self.default_zip
    }

    /// Parses `words` into a 5-digit string.
    ///
    /// # Arguments
    /// * `words` - Whitespace separated number-words, e.g. `"seven three zero two five"`.
    ///
    /// # Returns
    /// * `String` - The first five digits spoken, or the default code.
    pub fn parse(&self, words: &str) -> String {
        let mut digits = String::with_capacity(ZIP_LEN);
        for token in words.split_whitespace() {
            let Some(value) = token_digits(token) else {
                break;
            };
            digits.push_str(&value);
            if digits.len() >= ZIP_LEN {
                digits.truncate(ZIP_LEN);
                return digits;
            }
        }
        warn!(
            spoken = words,
            parsed = %digits,
            default = %self.default_zip,
            "could not hear a full zip code, using default"
        );
        self.default_zip.clone()
    }
}

/// Maps one spoken token to the digits it stands for.
fn token_digits(token: &str) -> Option<String> {
    let word = token
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase();
    if word.is_empty() {
        return None;
    }
    if word.chars().all(|c| c.is_ascii_digit()) {
        return Some(word);
    }
    let digit = match word.as_str() {
        "zero" | "oh" | "o" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        _ => return None,
    };
    Some(digit.to_string())
}
