//! The in-memory store of signature records for one mission.

use crate::model::{SignatureInformation, SignatureStatus};

/// Holds the ordered signature records of the current mission and routes
/// asynchronous creation/verification results onto them by SecurityId.
#[derive(Debug, Default)]
pub struct SignatureStore {
    records: Vec<SignatureInformation>,
    next_security_id: u32,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_security_id: 1,
        }
    }

    /// A fresh SecurityId; ids stay unique for the lifetime of the store.
    pub fn new_security_id(&mut self) -> u32 {
        let id = self.next_security_id;
        self.next_security_id += 1;
        id
    }

    /// Begin a new mission: previous records are dropped, assigned ids are
    /// not reused.
    pub fn start_mission(&mut self) {
        self.records.clear();
    }

    /// Forces the mission to an end, releasing per-record listeners.
    pub fn end_mission(&mut self) {}

    pub fn push(&mut self, info: SignatureInformation) {
        self.records.push(info);
    }

    pub fn records(&self) -> &[SignatureInformation] {
        &self.records
    }

    pub fn take_records(&mut self) -> Vec<SignatureInformation> {
        std::mem::take(&mut self.records)
    }

    fn find(&self, security_id: u32) -> Option<usize> {
        self.records
            .iter()
            .position(|info| info.security_id == security_id)
    }

    /// Result callback from the signing backend.
    pub fn signature_created(&mut self, security_id: u32, status: SignatureStatus) {
        match self.find(security_id) {
            Some(index) => self.records[index].status = status,
            None => log::warn!("signature {security_id} not found for creation result"),
        }
    }

    /// Result callback from the verification backend.
    pub fn signature_verified(&mut self, security_id: u32, status: SignatureStatus) {
        match self.find(security_id) {
            Some(index) => self.records[index].status = status,
            None => log::warn!("signature {security_id} not found for verify result"),
        }
    }
}
