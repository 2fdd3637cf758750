/// Transform Module
///
/// Derives warehouse rows from source records: song/artist projection,
/// time decomposition, user projection and the songplay lookup join.
use crate::db::statements::{Invocation, Param, StatementCatalog, StatementKind};
use crate::db::warehouse::Warehouse;
use crate::error::EtlError;
use crate::models::{ArtistRecord, LogEvent, SongFile, SongKeys, SongRecord, SongplayFact, TimeRow, UserRecord};
use chrono::{DateTime, Datelike, Timelike};

/// Split one song catalog object into its song and artist rows
pub fn split_song_file(file: SongFile) -> (SongRecord, ArtistRecord) {
    let song = SongRecord {
        song_id: file.song_id,
        title: file.title,
        artist_id: file.artist_id.clone(),
        year: file.year,
        duration: file.duration,
    };

    let artist = ArtistRecord {
        artist_id: file.artist_id,
        name: file.artist_name,
        location: file.artist_location,
        latitude: file.artist_latitude,
        longitude: file.artist_longitude,
    };

    (song, artist)
}

/// Decompose an epoch-millisecond timestamp (UTC, no zone conversion)
pub fn derive_time_row(ts: i64) -> Result<TimeRow, EtlError> {
    let at = DateTime::from_timestamp_millis(ts).ok_or(EtlError::InvalidTimestamp(ts))?;

    Ok(TimeRow {
        start_time: at.naive_utc(),
        hour: at.hour(),
        day: at.day(),
        week: at.iso_week().week(),
        month: at.month(),
        year: at.year(),
        weekday: at.format("%A").to_string(),
    })
}

pub fn project_user(event: &LogEvent) -> UserRecord {
    UserRecord {
        user_id: event.user_id,
        first_name: event.first_name.clone(),
        last_name: event.last_name.clone(),
        gender: event.gender.clone(),
        level: event.level.clone(),
    }
}

/// Resolve song/artist ids by exact match on (title, artist name, duration)
///
/// A miss is not an error; it yields `None`.
pub async fn resolve_song_keys<W: Warehouse>(
    warehouse: &mut W,
    catalog: &StatementCatalog,
    event: &LogEvent,
) -> Result<Option<SongKeys>, EtlError> {
    let lookup = Invocation::new(StatementKind::SongSelect)
        .value("title", Param::text(event.song.as_str()))
        .value("artist", Param::text(event.artist.as_str()))
        .value("duration", Param::Float(Some(event.length)));

    let (sql, params) = lookup.resolve(catalog)?;
    let keys = warehouse.fetch_key_pair(sql, &params).await?;

    if keys.is_none() {
        tracing::debug!("No song match for '{}' by '{}' ({})", event.song, event.artist, event.length);
    }

    Ok(keys.map(|(song_id, artist_id)| SongKeys { song_id, artist_id }))
}

pub fn build_songplay(event: &LogEvent, time: &TimeRow, keys: Option<SongKeys>) -> SongplayFact {
    let (song_id, artist_id) = match keys {
        Some(keys) => (Some(keys.song_id), Some(keys.artist_id)),
        None => (None, None),
    };

    SongplayFact {
        start_time: time.start_time,
        user_id: event.user_id,
        level: event.level.clone(),
        song_id,
        artist_id,
        session_id: event.session_id,
        location: event.location.clone(),
        user_agent: event.user_agent.clone(),
    }
}
