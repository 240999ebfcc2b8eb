//! The payload raced by the simulator: a room reservation over a time interval.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("invalid time of day")]
    InvalidTime,
    #[error("reservation must end after it starts: {start} >= {end}")]
    EmptyInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub capacity: u32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    room: Room,
    holder: Holder,
    start: NaiveDateTime,
    end: NaiveDateTime,
    reason: String,
}

impl Reservation {
    pub fn new(
        room: Room,
        holder: Holder,
        start: NaiveDateTime,
        end: NaiveDateTime,
        reason: impl Into<String>,
    ) -> Result<Self, ReservationError> {
        if start >= end {
            return Err(ReservationError::EmptyInterval { start, end });
        }

        Ok(Self {
            room,
            holder,
            start,
            end,
            reason: reason.into(),
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    /// Moves the whole interval, keeping its length.
    pub fn shift(&mut self, by: Duration) {
        self.start += by;
        self.end += by;
    }
}

/// The reservation every scenario starts from: a two-hour team meeting
/// from 10:00 to 12:00 on the given day.
pub fn team_meeting(day: NaiveDate) -> Result<Reservation, ReservationError> {
    let start = day
        .and_hms_opt(10, 0, 0)
        .ok_or(ReservationError::InvalidTime)?;
    let end = day
        .and_hms_opt(12, 0, 0)
        .ok_or(ReservationError::InvalidTime)?;

    Reservation::new(
        Room {
            name: "Salle 7".to_owned(),
            capacity: 40,
            description: Some("Room with projector".to_owned()),
        },
        Holder {
            first_name: "Othmane".to_owned(),
            last_name: "MTN".to_owned(),
            email: "othmane@example.com".to_owned(),
        },
        start,
        end,
        "Team meeting",
    )
}
