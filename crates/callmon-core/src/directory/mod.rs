//! Reconciliation of resolved callers into the device phonebook
//!
//! The device owns the phonebook. [`Directory`] keeps a view of it for one
//! reconciliation pass and reloads that view after every change, so later
//! lookups in the same pass see what was just written.

pub mod contact;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::collaborators::DeviceControl;
use crate::error::{Error, Result};

pub use contact::{parse_contacts, ContactBuilder, ContactNumber, DirectoryContact};

/// What a reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<(String, String)>,
    pub appended: Vec<(String, String)>,
    pub unchanged: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.appended.is_empty()
    }
}

/// View of one phonebook on the device
pub struct Directory {
    device: Arc<dyn DeviceControl>,
    book_id: String,
    name: String,
    contacts: Vec<DirectoryContact>,
}

impl Directory {
    /// Open the phonebook called `name`. Fails when the device has none.
    pub async fn open(device: Arc<dyn DeviceControl>, name: &str) -> Result<Self> {
        let book = device
            .phonebooks()
            .await?
            .into_iter()
            .find(|book| book.name == name)
            .ok_or_else(|| Error::PhonebookNotFound {
                name: name.to_string(),
            })?;
        info!("Using phonebook '{}' (id {})", book.name, book.id);

        let mut directory = Self {
            device,
            book_id: book.id,
            name: book.name,
            contacts: Vec::new(),
        };
        directory.refresh().await?;
        Ok(directory)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contacts(&self) -> &[DirectoryContact] {
        &self.contacts
    }

    /// Reload the view from the device
    pub async fn refresh(&mut self) -> Result<()> {
        let xml = self.device.phonebook_xml(&self.book_id).await?;
        self.contacts = parse_contacts(&xml)?;
        debug!("Phonebook '{}' holds {} contacts", self.name, self.contacts.len());
        Ok(())
    }

    /// Contact whose display name equals `name` once both are unescaped
    pub fn find_by_name(&self, name: &str) -> Option<&DirectoryContact> {
        let name = unescape(name);
        self.contacts.iter().find(|c| c.display_name == name)
    }

    pub fn find_by_number(&self, number: &str) -> Option<&DirectoryContact> {
        self.contacts.iter().find(|c| c.has_number(number))
    }

    /// Append `number` to an existing contact. Returns `false` when the
    /// contact already has it.
    pub async fn append_number(&mut self, contact_id: &str, number: &str) -> Result<bool> {
        let xml = self
            .device
            .phonebook_entry_xml(&self.book_id, contact_id)
            .await?;
        let mut contact = parse_contacts(&xml)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::xml(format!("entry {} holds no contact", contact_id)))?;

        if !contact.append_number(number) {
            return Ok(false);
        }

        let entry = ContactBuilder::new().build(&contact)?;
        self.device
            .set_phonebook_entry(&self.book_id, Some(contact_id), &entry)
            .await?;
        self.refresh().await?;
        Ok(true)
    }

    /// Create a new contact with a single number
    pub async fn create_contact(&mut self, name: &str, number: &str) -> Result<()> {
        let contact = DirectoryContact::new(unescape(name), number);
        let entry = ContactBuilder::new().build(&contact)?;
        self.device
            .set_phonebook_entry(&self.book_id, None, &entry)
            .await?;
        self.refresh().await
    }

    /// Merge a number → name mapping into the phonebook.
    ///
    /// Numbers the phonebook already holds are left alone. Otherwise the
    /// number is appended to the contact with the same name, or a new contact
    /// is created. Device failures are logged per pair and do not stop the
    /// pass.
    pub async fn reconcile(&mut self, found: &BTreeMap<String, String>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (number, name) in found {
            let pair = (number.clone(), name.clone());

            if let Some(owner) = self.find_by_number(number) {
                info!("{} {} already defined as {}", name, number, owner.display_name);
                report.unchanged.push(pair);
                continue;
            }

            let existing = self
                .find_by_name(name)
                .map(|c| c.contact_id.clone());

            let outcome = match existing {
                Some(Some(contact_id)) => self
                    .append_number(&contact_id, number)
                    .await
                    .map(|appended| if appended { Change::Appended } else { Change::Unchanged }),
                Some(None) => Err(Error::xml(format!("contact '{}' has no index", name))),
                None => self.create_contact(name, number).await.map(|_| Change::Created),
            };

            match outcome {
                Ok(Change::Appended) => {
                    info!("{} {} has been appended", name, number);
                    report.appended.push(pair);
                }
                Ok(Change::Created) => {
                    info!("{} {} has been added", name, number);
                    report.created.push(pair);
                }
                Ok(Change::Unchanged) => {
                    info!("{} {} already defined", name, number);
                    report.unchanged.push(pair);
                }
                Err(e) => {
                    error!("Cannot store {} {}: {}", name, number, e);
                    report.failed.push(pair);
                }
            }
        }

        report
    }
}

enum Change {
    Appended,
    Created,
    Unchanged,
}

fn unescape(name: &str) -> String {
    quick_xml::escape::unescape(name)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| name.to_string())
}
