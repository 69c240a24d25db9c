//! VIN structure checks: length, character set, check digit and model year code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VIN positions weights used for the check digit (49 CFR 565).
const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

/// Model year codes in cycle order starting at 1980.
const YEAR_CODES: &[u8; 30] = b"ABCDEFGHJKLMNPRSTVWXY123456789";

/// A reason a VIN is not structurally valid.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VinProblem {
    #[error("VIN must be 17 characters, found {found}")]
    Length { found: usize },

    #[error("VIN contains invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("VIN check digit is '{found}', expected '{expected}'")]
    CheckDigit { expected: char, found: char },

    #[error("VIN model year code '{code}' does not match model year {model_year}")]
    ModelYear { code: char, model_year: u16 },
}

fn transliterate(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'A' | b'J' => Some(1),
        b'B' | b'K' | b'S' => Some(2),
        b'C' | b'L' | b'T' => Some(3),
        b'D' | b'M' | b'U' => Some(4),
        b'E' | b'N' | b'V' => Some(5),
        b'F' | b'W' => Some(6),
        b'G' | b'P' | b'X' => Some(7),
        b'H' | b'Y' => Some(8),
        b'R' | b'Z' => Some(9),
        _ => None,
    }
}

/// Compute the expected check digit for a 17 character VIN.
pub fn check_digit(vin: &str) -> Option<char> {
    let bytes = vin.as_bytes();
    if bytes.len() != 17 {
        return None;
    }
    let mut sum = 0u32;
    for (b, w) in bytes.iter().zip(WEIGHTS) {
        sum += transliterate(*b)? * w;
    }
    match sum % 11 {
        10 => Some('X'),
        n => char::from_digit(n, 10),
    }
}

/// Model years a position-10 code can stand for between 1980 and 2069.
pub fn model_years_for_code(code: char) -> Vec<u16> {
    let Some(idx) = YEAR_CODES.iter().position(|&c| c as char == code) else {
        return Vec::new();
    };
    (0..3).map(|cycle| 1980 + idx as u16 + cycle * 30).collect()
}

/// Validate a VIN against the given model year. Empty result means valid.
pub fn validate(vin: &str, model_year: u16) -> Vec<VinProblem> {
    let mut problems = Vec::new();
    let len = vin.chars().count();
    if len != 17 {
        problems.push(VinProblem::Length { found: len });
    }

    for (i, c) in vin.chars().enumerate() {
        let allowed = c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'));
        if !allowed {
            problems.push(VinProblem::InvalidCharacter {
                character: c,
                position: i + 1,
            });
        }
    }

    if !problems.is_empty() {
        return problems;
    }

    if let Some(expected) = check_digit(vin) {
        let found = vin.as_bytes()[8] as char;
        if found != expected {
            problems.push(VinProblem::CheckDigit { expected, found });
        }
    }

    let code = vin.as_bytes()[9] as char;
    if !model_years_for_code(code).contains(&model_year) {
        problems.push(VinProblem::ModelYear { code, model_year });
    }

    problems
}
