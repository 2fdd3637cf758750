/// Extract Module
///
/// Reads one source file and turns it into the ordered statement invocations
/// for its target tables.
use crate::db::statements::{Invocation, StatementCatalog};
use crate::db::warehouse::Warehouse;
use crate::error::EtlError;
use crate::etl::transform;
use crate::models::{LogEvent, SongFile, NEXT_SONG_PAGE};
use std::path::Path;

/// Per-file extractor bound to a target table set
#[allow(async_fn_in_trait)]
pub trait Extractor {
    /// Name shown in progress output
    fn dataset(&self) -> &'static str;

    async fn extract<W: Warehouse>(
        &self,
        path: &Path,
        warehouse: &mut W,
        catalog: &StatementCatalog,
    ) -> Result<Extracted, EtlError>;
}

/// Invocations produced for one file, in execution order
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub invocations: Vec<Invocation>,
    pub lookups_hit: usize,
    pub lookups_missed: usize,
}

/// Song catalog files: one song insert then one artist insert
#[derive(Debug, Clone, Copy, Default)]
pub struct SongFileExtractor;

impl Extractor for SongFileExtractor {
    fn dataset(&self) -> &'static str {
        "song_data"
    }

    async fn extract<W: Warehouse>(
        &self,
        path: &Path,
        _warehouse: &mut W,
        _catalog: &StatementCatalog,
    ) -> Result<Extracted, EtlError> {
        let content = read_file(path).await?;
        let song_file = parse_song_file(&content, path)?;

        let (song, artist) = transform::split_song_file(song_file);

        Ok(Extracted { invocations: vec![song.into_invocation(), artist.into_invocation()], ..Default::default() })
    }
}

/// Activity log files: time rows, then user rows, then songplay facts
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFileExtractor;

impl Extractor for LogFileExtractor {
    fn dataset(&self) -> &'static str {
        "log_data"
    }

    async fn extract<W: Warehouse>(
        &self,
        path: &Path,
        warehouse: &mut W,
        catalog: &StatementCatalog,
    ) -> Result<Extracted, EtlError> {
        let content = read_file(path).await?;
        let events = parse_log_events(&content, path)?;

        let times = events.iter().map(|event| transform::derive_time_row(event.ts)).collect::<Result<Vec<_>, _>>()?;

        let mut extracted = Extracted { invocations: Vec::with_capacity(events.len() * 3), ..Default::default() };

        extracted.invocations.extend(times.iter().cloned().map(|time| time.into_invocation()));
        extracted.invocations.extend(events.iter().map(|event| transform::project_user(event).into_invocation()));

        for (event, time) in events.iter().zip(&times) {
            let keys = transform::resolve_song_keys(warehouse, catalog, event).await?;

            if keys.is_some() {
                extracted.lookups_hit += 1;
            } else {
                extracted.lookups_missed += 1;
            }

            extracted.invocations.push(transform::build_songplay(event, time, keys).into_invocation());
        }

        Ok(extracted)
    }
}

async fn read_file(path: &Path) -> Result<String, EtlError> {
    tokio::fs::read_to_string(path).await.map_err(|e| EtlError::io(path, e))
}

/// Parse the first JSON object of a song file; anything after it is ignored
pub fn parse_song_file(content: &str, path: &Path) -> Result<SongFile, EtlError> {
    let first = serde_json::Deserializer::from_str(content)
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| EtlError::EmptyFile(path.to_path_buf()))?
        .map_err(|source| EtlError::Parse { path: path.to_path_buf(), line: source.line(), source })?;

    // Line where the object starts, past any leading blank lines
    let start = content.len() - content.trim_start().len();
    let line = content[..start].matches('\n').count() + 1;

    serde_json::from_value(first).map_err(|source| EtlError::Shape { path: path.to_path_buf(), line, source })
}

/// Parse a JSON-lines log file, keeping only `NextSong` events in file order
///
/// Every line must be valid JSON; only retained events must match the event shape.
pub fn parse_log_events(content: &str, path: &Path) -> Result<Vec<LogEvent>, EtlError> {
    let mut events = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|source| EtlError::Parse { path: path.to_path_buf(), line: line_no, source })?;

        if value.get("page").and_then(|p| p.as_str()) != Some(NEXT_SONG_PAGE) {
            continue;
        }

        let event = serde_json::from_value(value)
            .map_err(|source| EtlError::Shape { path: path.to_path_buf(), line: line_no, source })?;
        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryWarehouse;
    use crate::db::statements::{Param, StatementKind};
    use std::path::PathBuf;

    const SONG_JSON: &str = r#"{"num_songs": 1, "artist_id": "ARD7TVE1187B99BFB1", "artist_latitude": null, "artist_longitude": null, "artist_location": "California - LA", "artist_name": "Casual", "song_id": "SOMZWCG12A8C13C480", "title": "I Didn't Mean To", "duration": 218.93179, "year": 0}"#;

    fn log_line(page: &str, ts: i64, user_id: &str, song: &str) -> String {
        format!(
            r#"{{"artist":"Elena","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":269.58312,"level":"paid","location":"Chicago","method":"PUT","page":"{}","registration":1541048010796.0,"sessionId":818,"song":"{}","status":200,"ts":{},"userAgent":"Mozilla/5.0","userId":"{}"}}"#,
            page, song, ts, user_id
        )
    }

    fn home_line(ts: i64) -> String {
        format!(
            r#"{{"artist":null,"auth":"Logged Out","firstName":null,"gender":null,"itemInSession":0,"lastName":null,"length":null,"level":"free","location":null,"method":"GET","page":"Home","registration":null,"sessionId":52,"song":null,"status":200,"ts":{},"userAgent":null,"userId":""}}"#,
            ts
        )
    }

    fn write_temp(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_song_file_projects_song_then_artist() {
        let (_dir, path) = write_temp(SONG_JSON);
        let catalog = StatementCatalog::postgres();
        let mut warehouse = MemoryWarehouse::new();

        let extracted = SongFileExtractor.extract(&path, &mut warehouse, &catalog).await.unwrap();
        assert_eq!(extracted.invocations.len(), 2);

        let (_, song_params) = extracted.invocations[0].resolve(&catalog).unwrap();
        assert_eq!(extracted.invocations[0].kind, StatementKind::SongInsert);
        assert_eq!(
            song_params,
            vec![
                Param::text("SOMZWCG12A8C13C480"),
                Param::text("I Didn't Mean To"),
                Param::text("ARD7TVE1187B99BFB1"),
                Param::Int(Some(0)),
                Param::Float(Some(218.93179)),
            ]
        );

        let (_, artist_params) = extracted.invocations[1].resolve(&catalog).unwrap();
        assert_eq!(extracted.invocations[1].kind, StatementKind::ArtistInsert);
        assert_eq!(
            artist_params,
            vec![
                Param::text("ARD7TVE1187B99BFB1"),
                Param::text("Casual"),
                Param::text("California - LA"),
                Param::Float(None),
                Param::Float(None),
            ]
        );
        assert!(warehouse.lookups.is_empty());
    }

    #[test]
    fn test_song_file_reads_only_first_object() {
        let content = format!("{}\n{}", SONG_JSON, SONG_JSON.replace("Casual", "Someone Else"));

        let song = parse_song_file(&content, Path::new("song.json")).unwrap();
        assert_eq!(song.artist_name, "Casual");
    }

    #[test]
    fn test_song_file_errors() {
        let path = Path::new("song.json");

        assert!(matches!(parse_song_file("   \n", path), Err(EtlError::EmptyFile(_))));
        assert!(matches!(parse_song_file("{not json", path), Err(EtlError::Parse { .. })));
        assert!(matches!(parse_song_file(r#"{"song_id": "S1"}"#, path), Err(EtlError::Shape { .. })));
    }

    #[test]
    fn test_song_file_error_lines_skip_leading_blanks() {
        let path = Path::new("song.json");

        assert!(matches!(parse_song_file("\n\n{\"song_id\": \"S1\"}", path), Err(EtlError::Shape { line: 3, .. })));
        assert!(matches!(parse_song_file("\n\n\n{broken", path), Err(EtlError::Parse { line: 4, .. })));
    }

    #[test]
    fn test_log_filter_keeps_next_song_in_order() {
        let content = [
            home_line(1541105830796),
            log_line("NextSong", 1541106106796, "8", "first"),
            log_line("Settings", 1541106132796, "8", "ignored"),
            String::new(),
            log_line("NextSong", 1541106352796, "8", "second"),
        ]
        .join("\n");

        let events = parse_log_events(&content, Path::new("log.json")).unwrap();
        let songs: Vec<_> = events.iter().map(|e| e.song.as_str()).collect();

        assert_eq!(songs, vec!["first", "second"]);
    }

    #[test]
    fn test_log_malformed_line_reports_line_number() {
        let content = format!("{}\n{{broken", log_line("NextSong", 1541106106796, "8", "a"));

        match parse_log_events(&content, Path::new("log.json")) {
            Err(EtlError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_log_next_song_missing_field_is_shape_error() {
        let content = log_line("NextSong", 1541106106796, "8", "a").replace(r#""sessionId":818,"#, "");

        assert!(matches!(parse_log_events(&content, Path::new("log.json")), Err(EtlError::Shape { line: 1, .. })));
    }

    #[tokio::test]
    async fn test_log_file_emits_buckets_in_order() {
        let content = [
            log_line("NextSong", 1541106106796, "8", "Setanta matins"),
            home_line(1541106132796),
            log_line("NextSong", 1541106106796, "10", "Unknown Song"),
            log_line("Logout", 1541106352796, "8", "x"),
            log_line("NextSong", 1541109954796, "15", "Setanta matins"),
        ]
        .join("\n");
        let (_dir, path) = write_temp(&content);
        let catalog = StatementCatalog::postgres();
        let mut warehouse =
            MemoryWarehouse::new().with_song("Setanta matins", "Elena", 269.58312, "SOZCTXZ12AB0182364", "AR5KOSW1187FB35FF4");
        warehouse.begin().await.unwrap();

        let extracted = LogFileExtractor.extract(&path, &mut warehouse, &catalog).await.unwrap();
        let kinds: Vec<_> = extracted.invocations.iter().map(|i| i.kind).collect();

        assert_eq!(
            kinds,
            vec![
                StatementKind::TimeInsert,
                StatementKind::TimeInsert,
                StatementKind::TimeInsert,
                StatementKind::UserInsert,
                StatementKind::UserInsert,
                StatementKind::UserInsert,
                StatementKind::SongplayInsert,
                StatementKind::SongplayInsert,
                StatementKind::SongplayInsert,
            ]
        );

        // Same timestamp twice is not deduplicated
        assert_eq!(extracted.invocations[0], extracted.invocations[1]);

        let users: Vec<_> = extracted.invocations[3..6].iter().map(|i| i.get("user_id").cloned().unwrap()).collect();
        assert_eq!(users, vec![Param::Int(Some(8)), Param::Int(Some(10)), Param::Int(Some(15))]);

        let song_ids: Vec<_> = extracted.invocations[6..].iter().map(|i| i.get("song_id").cloned().unwrap()).collect();
        assert_eq!(
            song_ids,
            vec![Param::text("SOZCTXZ12AB0182364"), Param::Text(None), Param::text("SOZCTXZ12AB0182364")]
        );
        assert_eq!(extracted.lookups_hit, 2);
        assert_eq!(extracted.lookups_missed, 1);
        assert_eq!(warehouse.lookups.len(), 3);
    }

    #[tokio::test]
    async fn test_log_file_without_plays_emits_nothing() {
        let (_dir, path) = write_temp(&home_line(1541105830796));
        let mut warehouse = MemoryWarehouse::new();

        let extracted =
            LogFileExtractor.extract(&path, &mut warehouse, &StatementCatalog::postgres()).await.unwrap();

        assert!(extracted.invocations.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let mut warehouse = MemoryWarehouse::new();
        let result = SongFileExtractor
            .extract(Path::new("/nonexistent/song.json"), &mut warehouse, &StatementCatalog::postgres())
            .await;

        assert!(matches!(result, Err(EtlError::Io { .. })));
    }
}
