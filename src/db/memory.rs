/// In-memory warehouse used by the test suite
use crate::db::statements::Param;
use crate::db::warehouse::Warehouse;
use crate::error::EtlError;

#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub params: Vec<Param>,
    /// Number of commits that happened before this statement
    pub batch: usize,
}

/// Records every call; lookups answer from seeded (title, artist, duration) triples
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    pub executed: Vec<Executed>,
    pub lookups: Vec<Vec<Param>>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    songs: Vec<(String, String, f64, String, String)>,
    fail_at: Option<usize>,
    in_tx: bool,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_song(mut self, title: &str, artist: &str, duration: f64, song_id: &str, artist_id: &str) -> Self {
        self.songs.push((title.into(), artist.into(), duration, song_id.into(), artist_id.into()));
        self
    }

    /// Fail the n-th executed statement (0-based, counted across the run)
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn executed_containing(&self, fragment: &str) -> Vec<&Executed> {
        self.executed.iter().filter(|e| e.sql.contains(fragment)).collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }
}

impl Warehouse for MemoryWarehouse {
    async fn begin(&mut self) -> Result<(), EtlError> {
        self.begins += 1;
        self.in_tx = true;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, EtlError> {
        if !self.in_tx {
            return Err(EtlError::NoActiveTransaction);
        }
        if self.fail_at == Some(self.executed.len()) {
            self.fail_at = None;
            return Err(EtlError::Database(sqlx::Error::Protocol("injected failure".into())));
        }

        self.executed.push(Executed { sql: sql.to_string(), params: params.to_vec(), batch: self.commits });
        Ok(1)
    }

    async fn fetch_key_pair(&mut self, _sql: &str, params: &[Param]) -> Result<Option<(String, String)>, EtlError> {
        if !self.in_tx {
            return Err(EtlError::NoActiveTransaction);
        }
        self.lookups.push(params.to_vec());

        let title = match params.first() {
            Some(Param::Text(Some(v))) => Some(v.as_str()),
            _ => None,
        };
        let artist = match params.get(1) {
            Some(Param::Text(Some(v))) => Some(v.as_str()),
            _ => None,
        };
        let duration = match params.get(2) {
            Some(Param::Float(v)) => *v,
            _ => None,
        };

        Ok(self
            .songs
            .iter()
            .find(|(t, a, d, _, _)| Some(t.as_str()) == title && Some(a.as_str()) == artist && Some(*d) == duration)
            .map(|(_, _, _, song_id, artist_id)| (song_id.clone(), artist_id.clone())))
    }

    async fn commit(&mut self) -> Result<(), EtlError> {
        if !self.in_tx {
            return Err(EtlError::NoActiveTransaction);
        }
        self.in_tx = false;
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EtlError> {
        if self.in_tx {
            self.in_tx = false;
            self.rollbacks += 1;
        }
        Ok(())
    }
}
