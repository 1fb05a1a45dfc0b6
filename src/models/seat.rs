use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Код места: буква ряда + номер, например `C14`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatCode(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid seat code: {0:?}")]
pub struct InvalidSeatCode(pub String);

impl SeatCode {
    pub fn new(row: char, number: u32) -> Self {
        SeatCode(format!("{}{}", row.to_ascii_uppercase(), number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn row_letter(&self) -> char {
        // Конструкторы гарантируют непустую строку с ASCII-буквой в начале
        self.0.chars().next().unwrap_or('?')
    }

    pub fn number(&self) -> u32 {
        self.0[1..].parse().unwrap_or(0)
    }
}

impl FromStr for SeatCode {
    type Err = InvalidSeatCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| InvalidSeatCode(s.to_string()))?;
        let number: u32 = chars
            .as_str()
            .parse()
            .map_err(|_| InvalidSeatCode(s.to_string()))?;
        if number == 0 {
            return Err(InvalidSeatCode(s.to_string()));
        }
        Ok(SeatCode::new(letter, number))
    }
}

impl TryFrom<String> for SeatCode {
    type Error = InvalidSeatCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatCode> for String {
    fn from(code: SeatCode) -> Self {
        code.0
    }
}

impl fmt::Display for SeatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    #[serde(rename = "pre-reserved", alias = "pre_reserved", alias = "prereserved")]
    PreReserved,
    Reserved,
    Occupied,
    #[serde(other)]
    Unknown,
}

impl SeatStatus {
    pub fn label(self) -> &'static str {
        match self {
            SeatStatus::Available => "Disponível",
            SeatStatus::PreReserved => "Pré-reservado",
            SeatStatus::Reserved => "Em análise",
            SeatStatus::Occupied => "Aprovado",
            SeatStatus::Unknown => "Desconhecido",
        }
    }
}

/// Запись о месте в том виде, в каком её отдаёт внешний API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub code: SeatCode,
    pub status: SeatStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SeatRecord {
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_api_timestamp)
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at.as_deref().and_then(parse_api_timestamp)
    }
}

// API отдаёт то RFC 3339, то naive ISO без зоны
pub fn parse_api_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
