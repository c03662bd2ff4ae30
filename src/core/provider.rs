use crate::core::record::{DNSRecord, DNSRecordType, NewDNSRecord, Zone};
use crate::error::Error;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DNSProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Zones whose name is exactly `name`.
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>, Error>;
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: DNSRecordType,
        name: &str,
    ) -> Result<Vec<DNSRecord>, Error>;
    async fn create_record(&self, zone_id: &str, record: NewDNSRecord) -> Result<DNSRecord, Error>;
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), Error>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeState {
        zones: Vec<Zone>,
        records: Vec<(String, DNSRecord)>,
        next_id: u32,
        creates: usize,
        deletes: usize,
        zone_queries: Vec<String>,
        failing_zone_queries: HashSet<String>,
        fail_writes: Option<Error>,
    }

    /// In-memory provider keeping records per zone and counting mutations.
    #[derive(Default)]
    pub struct FakeProvider {
        state: Mutex<FakeState>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_zone(self, id: &str, name: &str) -> Self {
            self.state.lock().unwrap().zones.push(Zone {
                id: id.to_string(),
                name: name.to_string(),
            });
            self
        }

        pub fn with_txt(self, zone_id: &str, name: &str, content: &str) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                state.next_id += 1;
                let id = format!("rec-{}", state.next_id);
                state.records.push((
                    zone_id.to_string(),
                    DNSRecord {
                        id,
                        record_type: DNSRecordType::TXT,
                        name: name.to_string(),
                        content: content.to_string(),
                        ttl: Some(120),
                    },
                ));
            }
            self
        }

        pub fn fail_zone_query(self, name: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .failing_zone_queries
                .insert(name.to_string());
            self
        }

        pub fn fail_writes(self, err: Error) -> Self {
            self.state.lock().unwrap().fail_writes = Some(err);
            self
        }

        pub fn creates(&self) -> usize {
            self.state.lock().unwrap().creates
        }

        pub fn deletes(&self) -> usize {
            self.state.lock().unwrap().deletes
        }

        pub fn zone_queries(&self) -> Vec<String> {
            self.state.lock().unwrap().zone_queries.clone()
        }

        pub fn txt_contents(&self, name: &str) -> Vec<String> {
            self.state
                .lock()
                .unwrap()
                .records
                .iter()
                .filter(|(_, r)| r.name == name)
                .map(|(_, r)| r.content.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DNSProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn list_zones(&self, name: &str) -> Result<Vec<Zone>, Error> {
            let mut state = self.state.lock().unwrap();
            state.zone_queries.push(name.to_string());
            if state.failing_zone_queries.contains(name) {
                return Err(Error::provider(Some(500), "zone lookup failed"));
            }
            Ok(state
                .zones
                .iter()
                .filter(|z| z.name == name)
                .cloned()
                .collect())
        }

        async fn list_records(
            &self,
            zone_id: &str,
            record_type: DNSRecordType,
            name: &str,
        ) -> Result<Vec<DNSRecord>, Error> {
            let state = self.state.lock().unwrap();
            Ok(state
                .records
                .iter()
                .filter(|(z, r)| z == zone_id && r.record_type == record_type && r.name == name)
                .map(|(_, r)| r.clone())
                .collect())
        }

        async fn create_record(
            &self,
            zone_id: &str,
            record: NewDNSRecord,
        ) -> Result<DNSRecord, Error> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_writes.clone() {
                return Err(err);
            }
            state.next_id += 1;
            state.creates += 1;
            let created = DNSRecord {
                id: format!("rec-{}", state.next_id),
                record_type: record.record_type,
                name: record.name,
                content: record.content,
                ttl: Some(record.ttl),
            };
            state.records.push((zone_id.to_string(), created.clone()));
            Ok(created)
        }

        async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_writes.clone() {
                return Err(err);
            }
            let before = state.records.len();
            state
                .records
                .retain(|(z, r)| !(z == zone_id && r.id == record_id));
            if state.records.len() == before {
                return Err(Error::provider(Some(404), "Record does not exist"));
            }
            state.deletes += 1;
            Ok(())
        }
    }
}
