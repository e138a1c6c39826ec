use crate::models::device::DeviceId;
use crate::models::pdf_history::{PdfHistoryEntry, PdfInfo};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Ledger ids look like `<unix millis>-<8 hex>`.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &random[..8])
}

/// Bounded, newest-first history of uploaded PDFs per device.
#[derive(Debug)]
pub struct PdfLedger {
    limit: usize,
    entries: HashMap<DeviceId, VecDeque<PdfHistoryEntry>>,
}

impl PdfLedger {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: HashMap::new(),
        }
    }

    /// Inserts at the head. When the device is over the limit the oldest entry
    /// is dropped and handed back so its file can be deleted.
    pub fn record(&mut self, entry: PdfHistoryEntry) -> Option<PdfHistoryEntry> {
        let entries = self.entries.entry(entry.device_id.clone()).or_default();
        entries.push_front(entry);
        if entries.len() > self.limit { entries.pop_back() } else { None }
    }

    pub fn list(&self, device_id: &DeviceId) -> Vec<PdfInfo> {
        self.entries
            .get(device_id)
            .map(|entries| entries.iter().map(PdfInfo::from).collect())
            .unwrap_or_default()
    }

    pub fn fetch(&self, device_id: &DeviceId, id: &str) -> Option<&PdfHistoryEntry> {
        self.entries.get(device_id)?.iter().find(|entry| entry.id == id)
    }

    pub fn latest(&self, device_id: &DeviceId) -> Option<&PdfHistoryEntry> {
        self.entries.get(device_id)?.front()
    }

    /// Replaces a device's ledger with entries found on disk. Returns the
    /// entries beyond the limit, oldest last.
    pub fn restore(&mut self, device_id: &DeviceId, mut found: Vec<PdfHistoryEntry>) -> Vec<PdfHistoryEntry> {
        found.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then_with(|| b.id.cmp(&a.id)));
        let overflow = found.split_off(found.len().min(self.limit));
        if !found.is_empty() {
            self.entries.insert(device_id.clone(), found.into());
        }
        overflow
    }
}
