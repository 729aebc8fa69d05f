//! Customer lookup table and its active-source selection.
//!
//! Two tables exist: the one bundled with the extension and one scraped from a
//! CRM report and saved by the user. A flag in the `sync` scope picks which
//! one enrichment joins against.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use caselens_protocols::{CustomerRecord, KeyValueStore, StoreError, StoreScope};

/// Sync-scope key holding the active source.
pub const ACTIVE_SOURCE_KEY: &str = "customerDataSource";

/// Local-scope key holding the scraped table.
pub const SCRAPED_TABLE_KEY: &str = "scrapedCustomerData";

/// Canonical form of an institution code: trimmed, upper-case, dashes and
/// spaces replaced by underscores.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .to_uppercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Customer records indexed by normalized institution code.
#[derive(Debug, Clone, Default)]
pub struct CustomerTable {
    by_code: HashMap<String, CustomerRecord>,
}

impl CustomerTable {
    pub fn new(records: Vec<CustomerRecord>) -> Self {
        let mut by_code = HashMap::with_capacity(records.len());
        for record in records {
            let code = normalize_code(&record.institution_code);
            if code.is_empty() {
                continue;
            }
            if by_code.insert(code.clone(), record).is_some() {
                debug!("Duplicate customer record for {}, keeping the last", code);
            }
        }
        Self { by_code }
    }

    /// Parse a JSON array of records.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let records: Vec<CustomerRecord> = serde_json::from_value(value)?;
        Ok(Self::new(records))
    }

    /// Look up by institution code in any spelling.
    pub fn find(&self, code: &str) -> Option<&CustomerRecord> {
        self.by_code.get(&normalize_code(code))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Which table enrichment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerSource {
    #[default]
    Bundled,
    Scraped,
}

impl fmt::Display for CustomerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerSource::Bundled => f.write_str("bundled"),
            CustomerSource::Scraped => f.write_str("scraped"),
        }
    }
}

/// Resolves the active customer table.
pub struct CustomerDataManager {
    store: Arc<dyn KeyValueStore>,
    bundled: Arc<CustomerTable>,
    scraped: RwLock<Option<Arc<CustomerTable>>>,
}

impl CustomerDataManager {
    pub fn new(store: Arc<dyn KeyValueStore>, bundled: CustomerTable) -> Self {
        Self {
            store,
            bundled: Arc::new(bundled),
            scraped: RwLock::new(None),
        }
    }

    pub async fn active_source(&self) -> CustomerSource {
        match self.store.get(StoreScope::Sync, ACTIVE_SOURCE_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Unrecognized customer data source flag: {}", e);
                CustomerSource::Bundled
            }),
            Ok(None) => CustomerSource::Bundled,
            Err(e) => {
                error!("Failed to read customer data source flag: {}", e);
                CustomerSource::Bundled
            }
        }
    }

    pub async fn set_active_source(&self, source: CustomerSource) -> Result<(), StoreError> {
        let items = HashMap::from([(ACTIVE_SOURCE_KEY.to_string(), serde_json::to_value(source)?)]);
        self.store.set(StoreScope::Sync, items).await?;
        info!("Customer data source set to {}", source);
        Ok(())
    }

    /// Persist a freshly scraped table and make it the active source.
    pub async fn save_scraped(&self, records: Vec<CustomerRecord>) -> Result<usize, StoreError> {
        let value = serde_json::to_value(&records)?;
        let table = Arc::new(CustomerTable::new(records));
        let count = table.len();
        self.store
            .set(
                StoreScope::Local,
                HashMap::from([(SCRAPED_TABLE_KEY.to_string(), value)]),
            )
            .await?;
        *self.scraped.write() = Some(table);
        self.set_active_source(CustomerSource::Scraped).await?;
        Ok(count)
    }

    /// The table selected by the active-source flag. Falls back to the bundled
    /// table when the scraped one is missing or unreadable.
    pub async fn table(&self) -> Arc<CustomerTable> {
        if self.active_source().await == CustomerSource::Bundled {
            return self.bundled.clone();
        }
        if let Some(table) = self.scraped.read().clone() {
            return table;
        }

        match self.store.get(StoreScope::Local, SCRAPED_TABLE_KEY).await {
            Ok(Some(value)) => match CustomerTable::from_json(value) {
                Ok(table) => {
                    let table = Arc::new(table);
                    *self.scraped.write() = Some(table.clone());
                    table
                }
                Err(e) => {
                    warn!("Scraped customer table is unreadable, using bundled: {}", e);
                    self.bundled.clone()
                }
            },
            Ok(None) => {
                warn!("Scraped customer source selected but none saved, using bundled");
                self.bundled.clone()
            }
            Err(e) => {
                error!("Failed to load scraped customer table: {}", e);
                self.bundled.clone()
            }
        }
    }
}
