/// Statement Catalog Module
///
/// Parameterized SQL statements keyed by logical name. The catalog owns the
/// parameter order of every statement; rows only provide named values.
use crate::error::EtlError;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Logical statement names used by the pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    SongInsert,
    ArtistInsert,
    TimeInsert,
    UserInsert,
    SongplayInsert,
    SongSelect,
}

impl StatementKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SongInsert => "song_insert",
            Self::ArtistInsert => "artist_insert",
            Self::TimeInsert => "time_insert",
            Self::UserInsert => "user_insert",
            Self::SongplayInsert => "songplay_insert",
            Self::SongSelect => "song_select",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, nullable SQL parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Timestamp(NaiveDateTime),
}

impl Param {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }
}

/// Statement text plus its declared parameter order
#[derive(Debug, Clone)]
pub struct Statement {
    pub params: Vec<&'static str>,
    pub sql: String,
}

impl Statement {
    pub fn new(params: &[&'static str], sql: impl Into<String>) -> Self {
        Self { params: params.to_vec(), sql: sql.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatementCatalog {
    statements: HashMap<StatementKind, Statement>,
}

impl StatementCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: StatementKind, statement: Statement) -> Self {
        self.statements.insert(kind, statement);
        self
    }

    pub fn get(&self, kind: StatementKind) -> Result<&Statement, EtlError> {
        self.statements.get(&kind).ok_or(EtlError::MissingStatement(kind))
    }

    /// Default catalog for the PostgreSQL star schema in `migrations/`
    ///
    /// Users are upserted so the latest subscription level wins; the other
    /// dimensions keep their first row.
    pub fn postgres() -> Self {
        Self::new()
            .with(
                StatementKind::SongInsert,
                Statement::new(
                    &["song_id", "title", "artist_id", "year", "duration"],
                    r#"
                    INSERT INTO songs (song_id, title, artist_id, year, duration)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (song_id) DO NOTHING
                    "#,
                ),
            )
            .with(
                StatementKind::ArtistInsert,
                Statement::new(
                    &["artist_id", "name", "location", "latitude", "longitude"],
                    r#"
                    INSERT INTO artists (artist_id, name, location, latitude, longitude)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (artist_id) DO NOTHING
                    "#,
                ),
            )
            .with(
                StatementKind::TimeInsert,
                Statement::new(
                    &["start_time", "hour", "day", "week", "month", "year", "weekday"],
                    r#"
                    INSERT INTO time (start_time, hour, day, week, month, year, weekday)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (start_time) DO NOTHING
                    "#,
                ),
            )
            .with(
                StatementKind::UserInsert,
                Statement::new(
                    &["user_id", "first_name", "last_name", "gender", "level"],
                    r#"
                    INSERT INTO users (user_id, first_name, last_name, gender, level)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (user_id)
                    DO UPDATE SET level = EXCLUDED.level
                    "#,
                ),
            )
            .with(
                StatementKind::SongplayInsert,
                Statement::new(
                    &["start_time", "user_id", "level", "song_id", "artist_id", "session_id", "location", "user_agent"],
                    r#"
                    INSERT INTO songplays (
                        start_time,
                        user_id,
                        level,
                        song_id,
                        artist_id,
                        session_id,
                        location,
                        user_agent
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                ),
            )
            .with(
                StatementKind::SongSelect,
                Statement::new(
                    &["title", "artist", "duration"],
                    r#"
                    SELECT s.song_id, a.artist_id
                    FROM songs s
                    JOIN artists a ON s.artist_id = a.artist_id
                    WHERE s.title = $1 AND a.name = $2 AND s.duration = $3
                    "#,
                ),
            )
    }
}

/// One statement call with named values, resolved against a catalog at execution time
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub kind: StatementKind,
    pub values: Vec<(&'static str, Param)>,
}

impl Invocation {
    pub fn new(kind: StatementKind) -> Self {
        Self { kind, values: Vec::new() }
    }

    pub fn value(mut self, column: &'static str, param: Param) -> Self {
        self.values.push((column, param));
        self
    }

    pub fn get(&self, column: &str) -> Option<&Param> {
        self.values.iter().find(|(name, _)| *name == column).map(|(_, param)| param)
    }

    /// Look up the statement and order the values by its declared parameters
    pub fn resolve<'c>(&self, catalog: &'c StatementCatalog) -> Result<(&'c str, Vec<Param>), EtlError> {
        let statement = catalog.get(self.kind)?;

        let params = statement
            .params
            .iter()
            .map(|&column| {
                self.get(column)
                    .cloned()
                    .ok_or(EtlError::MissingParameter { statement: self.kind, column })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((statement.sql.as_str(), params))
    }
}
