//! The play-result producer boundary: chart constants and the
//! score-to-rating conversion. The world engine itself only ever sees
//! the finalized rating.

use std::collections::HashMap;
use std::path::Path;

use cadenza_core::SongId;

/// Chart constants per song, indexed by difficulty class.
#[derive(Debug, Default)]
pub struct ChartIndex {
    charts: HashMap<SongId, Vec<f64>>,
}

impl ChartIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = std::fs::File::open(path)?;
        let charts = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(std::io::Error::other)?;

        Ok(Self { charts })
    }

    pub fn constant(&self, song_id: &str, difficulty: u8) -> Option<f64> {
        self.charts
            .get(song_id)?
            .get(difficulty as usize)
            .copied()
            .filter(|cc| *cc > 0.0)
    }

    /// Finalized play rating for a score; unknown charts rate zero.
    pub fn play_rating(&self, song_id: &str, difficulty: u8, score: i64) -> f64 {
        let Some(cc) = self.constant(song_id, difficulty) else {
            return 0.0;
        };

        if score >= 10_000_000 {
            cc + 2.0
        } else if score >= 9_800_000 {
            cc + 1.0 + (score - 9_800_000) as f64 / 200_000.0
        } else {
            (cc + (score - 9_500_000) as f64 / 300_000.0).max(0.0)
        }
    }
}
