use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::feed::SignalSource;
use crate::models::{MarketSnapshot, Timeframe};

/// One cycle's worth of snapshots, any symbols and timeframes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub snapshots: Vec<MarketSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReplayFile {
    frames: Vec<ReplayFrame>,
}

/// Plays recorded frames forward, one per cycle. Only the frame under the
/// cursor is visible.
pub struct ReplaySource {
    frames: Vec<ReplayFrame>,
    cursor: AtomicUsize,
}

impl ReplaySource {
    pub fn new(frames: Vec<ReplayFrame>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Loads `{"frames": [{"snapshots": [...]}, ...]}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing replay file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ReplayFile = serde_json::from_str(raw)?;
        Ok(Self::new(file.frames))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ReplaySource {
    async fn fetch_market(&self, symbol: &str, timeframe: Timeframe) -> Result<MarketSnapshot> {
        let idx = self.position();
        let frame = self
            .frames
            .get(idx)
            .with_context(|| format!("replay exhausted at frame {}", idx))?;
        frame
            .snapshots
            .iter()
            .find(|s| s.symbol == symbol && s.timeframe == timeframe)
            .cloned()
            .with_context(|| format!("no {} {} data in frame {}", symbol, timeframe, idx))
    }

    async fn advance(&self) -> Result<bool> {
        let next = self.cursor.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(next < self.frames.len())
    }
}
