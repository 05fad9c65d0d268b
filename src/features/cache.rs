use std::{
    collections::{HashMap, VecDeque},
    fmt::Write as _,
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::NormalizedRecord;

/// Bounded map from post content to extracted feature values.
///
/// Keys ignore the post id: two posts with identical content share a row.
/// The key is the full content, so a hit always belongs to the same content.
/// Oldest entries are evicted first once `capacity` is reached.
#[derive(Debug)]
pub struct FeatureCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    rows: HashMap<String, Vec<f64>>,
    order: VecDeque<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    feature_names: Vec<String>,
    rows: Vec<(String, Vec<f64>)>,
}

impl FeatureCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, record: &NormalizedRecord) -> Option<Vec<f64>> {
        self.inner.lock().rows.get(&content_key(record)).cloned()
    }

    pub fn insert(&self, record: &NormalizedRecord, values: Vec<f64>) {
        self.insert_key(content_key(record), values);
    }

    fn insert_key(&self, key: String, values: Vec<f64>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.rows.insert(key.clone(), values).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.rows.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// Restores rows written by [`save`](Self::save). A snapshot taken with a
    /// different feature layout is ignored. Returns the number of rows restored.
    pub fn load(&self, path: &Path, feature_names: &[String]) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let raw = fs::read(path)
            .with_context(|| format!("failed to read feature cache {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse feature cache {}", path.display()))?;
        if snapshot.feature_names != feature_names {
            tracing::warn!(
                target: "features",
                path = %path.display(),
                "feature cache was written with a different feature layout; ignoring it"
            );
            return Ok(0);
        }
        let mut restored = 0;
        for (key, values) in snapshot.rows {
            if values.len() == feature_names.len() {
                self.insert_key(key, values);
                restored += 1;
            }
        }
        Ok(restored)
    }

    pub fn save(&self, path: &Path, feature_names: &[String]) -> Result<()> {
        let snapshot = {
            let inner = self.inner.lock();
            Snapshot {
                feature_names: feature_names.to_vec(),
                rows: inner
                    .order
                    .iter()
                    .filter_map(|key| inner.rows.get(key).map(|row| (key.clone(), row.clone())))
                    .collect(),
            }
        };
        let body = serde_json::to_vec(&snapshot)?;
        fs::write(path, body)
            .with_context(|| format!("failed to write feature cache {}", path.display()))?;
        Ok(())
    }
}

/// Length-prefixed encoding of the content fields; distinct content never
/// yields the same key.
fn content_key(record: &NormalizedRecord) -> String {
    let fields = [
        record.created_at.as_deref(),
        record.text.as_deref(),
        Some(record.tweet_type.as_str()),
        record.image_url.as_deref(),
        record.quoted_text.as_deref(),
    ];
    let mut key = String::new();
    for field in fields {
        match field {
            Some(value) => {
                let _ = write!(key, "{}:{value};", value.len());
            }
            None => key.push_str("-;"),
        }
    }
    key
}
