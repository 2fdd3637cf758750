/// Data Models Module
///
/// Raw source records (song catalog files, activity log events) and the
/// warehouse rows derived from them. Each row knows how to turn itself into
/// a named-value statement invocation.
use crate::db::statements::{Invocation, Param, StatementKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

/// Page value marking a song play in the activity log
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One song catalog object as stored on disk
///
/// Nullable fields must still be present in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SongFile {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i64,
    pub duration: f64,
    pub artist_name: String,
    #[serde(deserialize_with = "Option::deserialize")]
    pub artist_location: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub artist_latitude: Option<f64>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub artist_longitude: Option<f64>,
}

/// Songs dimension row
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i64,
    pub duration: f64,
}

impl SongRecord {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(StatementKind::SongInsert)
            .value("song_id", Param::text(self.song_id))
            .value("title", Param::text(self.title))
            .value("artist_id", Param::text(self.artist_id))
            .value("year", Param::Int(Some(self.year)))
            .value("duration", Param::Float(Some(self.duration)))
    }
}

/// Artists dimension row
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtistRecord {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(StatementKind::ArtistInsert)
            .value("artist_id", Param::text(self.artist_id))
            .value("name", Param::text(self.name))
            .value("location", Param::Text(self.location))
            .value("latitude", Param::Float(self.latitude))
            .value("longitude", Param::Float(self.longitude))
    }
}

/// One activity log event that passed the `NextSong` filter
///
/// `page` is checked before projection and not kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Epoch milliseconds, UTC
    pub ts: i64,
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(deserialize_with = "Option::deserialize")]
    pub gender: Option<String>,
    pub level: String,
    pub song: String,
    pub artist: String,
    pub length: f64,
    pub session_id: i64,
    #[serde(deserialize_with = "Option::deserialize")]
    pub location: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub user_agent: Option<String>,
}

/// Time dimension row, a pure function of one event's timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    /// ISO-8601 week number
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: String,
}

impl TimeRow {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(StatementKind::TimeInsert)
            .value("start_time", Param::Timestamp(self.start_time))
            .value("hour", Param::Int(Some(self.hour.into())))
            .value("day", Param::Int(Some(self.day.into())))
            .value("week", Param::Int(Some(self.week.into())))
            .value("month", Param::Int(Some(self.month.into())))
            .value("year", Param::Int(Some(self.year.into())))
            .value("weekday", Param::text(self.weekday))
    }
}

/// Users dimension row
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub level: String,
}

impl UserRecord {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(StatementKind::UserInsert)
            .value("user_id", Param::Int(Some(self.user_id)))
            .value("first_name", Param::text(self.first_name))
            .value("last_name", Param::text(self.last_name))
            .value("gender", Param::Text(self.gender))
            .value("level", Param::text(self.level))
    }
}

/// Song and artist identifiers resolved by the dimension lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongKeys {
    pub song_id: String,
    pub artist_id: String,
}

/// Songplays fact row
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayFact {
    pub start_time: NaiveDateTime,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayFact {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(StatementKind::SongplayInsert)
            .value("start_time", Param::Timestamp(self.start_time))
            .value("user_id", Param::Int(Some(self.user_id)))
            .value("level", Param::text(self.level))
            .value("song_id", Param::Text(self.song_id))
            .value("artist_id", Param::Text(self.artist_id))
            .value("session_id", Param::Int(Some(self.session_id)))
            .value("location", Param::Text(self.location))
            .value("user_agent", Param::Text(self.user_agent))
    }
}

/// The raw logs store `userId` as a string; accept integers as well
fn int_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Text(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("userId '{}' is not numeric", text))),
    }
}
