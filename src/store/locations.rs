use crate::models::device::DeviceId;
use crate::models::location::{LocationFix, LocationRecord};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct DeviceTrack {
    current: Option<LocationRecord>,
    history: VecDeque<LocationRecord>,
}

/// Current position and bounded history per device.
#[derive(Debug)]
pub struct LocationBook {
    limit: usize,
    tracks: HashMap<DeviceId, DeviceTrack>,
}

impl LocationBook {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            tracks: HashMap::new(),
        }
    }

    /// Stamps the fix with `now` and makes it the device's current position.
    /// Timestamps never go backwards for a device, even if the wall clock does.
    pub fn record(&mut self, device_id: &DeviceId, fix: LocationFix, now: DateTime<Utc>) -> LocationRecord {
        let track = self.tracks.entry(device_id.clone()).or_default();
        let timestamp = match &track.current {
            Some(previous) if previous.timestamp > now => previous.timestamp,
            _ => now,
        };

        let record = LocationRecord {
            device_id: device_id.clone(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            timestamp,
        };

        track.history.push_back(record.clone());
        while track.history.len() > self.limit {
            track.history.pop_front();
        }
        track.current = Some(record.clone());
        record
    }

    pub fn current(&self, device_id: &DeviceId) -> Option<LocationRecord> {
        self.tracks.get(device_id).and_then(|track| track.current.clone())
    }

    /// Oldest first.
    pub fn history(&self, device_id: &DeviceId) -> Vec<LocationRecord> {
        self.tracks
            .get(device_id)
            .map(|track| track.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent position reported by any device.
    pub fn latest_overall(&self) -> Option<LocationRecord> {
        self.tracks
            .values()
            .filter_map(|track| track.current.as_ref())
            .max_by_key(|record| record.timestamp)
            .cloned()
    }

    /// All devices' histories interleaved by time, trimmed to the newest `limit`.
    pub fn merged_history(&self) -> Vec<LocationRecord> {
        let mut merged: Vec<LocationRecord> = self.tracks.values().flat_map(|track| track.history.iter().cloned()).collect();
        merged.sort_by_key(|record| record.timestamp);
        let excess = merged.len().saturating_sub(self.limit);
        merged.split_off(excess)
    }
}
