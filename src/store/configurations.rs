use crate::error::app_error::AppError;
use crate::models::configuration::{Configuration, ConfigurationData, PhotoEntry, QrEntry};
use crate::models::device::DeviceId;
use crate::models::pdf_history::PdfInfo;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// QR entries, photo metadata and the current PDF pointer of every device.
#[derive(Debug, Default)]
pub struct ConfigurationStore {
    configurations: HashMap<DeviceId, Configuration>,
}

impl ConfigurationStore {
    pub fn get(&self, device_id: &DeviceId) -> Option<&Configuration> {
        self.configurations.get(device_id)
    }

    fn entry(&mut self, device_id: &DeviceId, now: DateTime<Utc>) -> &mut Configuration {
        self.configurations
            .entry(device_id.clone())
            .or_insert_with(|| Configuration::empty(device_id.clone(), now))
    }

    /// Installs a new bundle: the QR list is replaced wholesale and every
    /// entry starts without a photo. Stored photo metadata is kept.
    pub fn replace_qr_codes(&mut self, device_id: &DeviceId, qr_codes: Vec<QrEntry>, pdf: PdfInfo, now: DateTime<Utc>) -> &Configuration {
        let configuration = self.entry(device_id, now);
        configuration.qr_codes = qr_codes
            .into_iter()
            .map(|entry| QrEntry { has_photo: false, ..entry })
            .collect();
        configuration.qr_pdf = Some(pdf);
        configuration.last_updated = now;
        configuration
    }

    /// Adds a single QR entry, replacing an existing one with the same filename.
    pub fn append_qr(&mut self, device_id: &DeviceId, entry: QrEntry, now: DateTime<Utc>) {
        let configuration = self.entry(device_id, now);
        match configuration.qr_codes.iter_mut().find(|existing| existing.filename == entry.filename) {
            Some(existing) => *existing = entry,
            None => configuration.qr_codes.push(entry),
        }
        configuration.last_updated = now;
    }

    /// Fails with `NoConfiguration` or `UnknownQr` unless `qr_filename` is part
    /// of the device's configuration.
    pub fn require_qr(&self, device_id: &DeviceId, qr_filename: &str) -> Result<&QrEntry, AppError> {
        let configuration = self.configurations.get(device_id).ok_or(AppError::NoConfiguration)?;
        configuration
            .qr_codes
            .iter()
            .find(|entry| entry.filename == qr_filename)
            .ok_or_else(|| AppError::UnknownQr(qr_filename.to_string()))
    }

    pub fn record_photo(&mut self, device_id: &DeviceId, photo: PhotoEntry, now: DateTime<Utc>) -> Result<(), AppError> {
        self.require_qr(device_id, &photo.qr_filename)?;

        let configuration = self.entry(device_id, now);
        if let Some(entry) = configuration.qr_codes.iter_mut().find(|entry| entry.filename == photo.qr_filename) {
            entry.has_photo = true;
        }
        configuration.photos.push(photo);
        configuration.last_updated = now;
        Ok(())
    }

    pub fn set_qr_pdf(&mut self, device_id: &DeviceId, pdf: Option<PdfInfo>, now: DateTime<Utc>) {
        self.entry(device_id, now).qr_pdf = pdf;
    }

    pub fn snapshot(&self, device_id: &DeviceId) -> ConfigurationData {
        match self.configurations.get(device_id) {
            Some(configuration) => ConfigurationData {
                device_id: device_id.clone(),
                qr_codes: configuration.qr_codes.clone(),
                photos: configuration.photos.clone(),
                qr_pdf: configuration.qr_pdf.clone(),
                last_updated: Some(configuration.last_updated),
            },
            None => ConfigurationData {
                device_id: device_id.clone(),
                qr_codes: Vec::new(),
                photos: Vec::new(),
                qr_pdf: None,
                last_updated: None,
            },
        }
    }

    /// One entry per stored photo file, the most recent upload winning.
    pub fn latest_photos(&self, device_id: &DeviceId) -> Vec<PhotoEntry> {
        let Some(configuration) = self.configurations.get(device_id) else {
            return Vec::new();
        };

        let mut latest: Vec<PhotoEntry> = Vec::new();
        for photo in &configuration.photos {
            match latest.iter_mut().find(|existing| existing.filename == photo.filename) {
                Some(existing) => *existing = photo.clone(),
                None => latest.push(photo.clone()),
            }
        }
        latest
    }
}
