//! Phonebook contact documents
//!
//! Contacts are parsed from the device's phonebook XML into typed structs and
//! only turned back into XML by [`ContactBuilder`] right before they are sent
//! to the device.
//!
//! ```xml
//! <phonebooks><phonebook name="Telefonbuch">
//!   <!-- idx:3 -->
//!   <contact>
//!     <category>0</category>
//!     <person><realName>Meier &amp; Söhne</realName></person>
//!     <telephony nid="1"><number type="home" prio="1" id="0">0612345</number></telephony>
//!     <uniqueid>17</uniqueid>
//!   </contact>
//! </phonebook></phonebooks>
//! ```

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// One phone number of a contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNumber {
    pub number: String,
    /// `home`, `mobile`, `work`, `fax_work`, ...
    pub kind: String,
    pub prio: Option<String>,
    pub id: Option<String>,
    pub quickdial: Option<String>,
    pub vanity: Option<String>,
}

impl ContactNumber {
    /// A number the way the monitor adds them: type `home`, priority `1`
    pub fn home(number: impl Into<String>, id: usize) -> Self {
        Self {
            number: number.into(),
            kind: "home".to_string(),
            prio: Some("1".to_string()),
            id: Some(id.to_string()),
            quickdial: None,
            vanity: None,
        }
    }
}

/// A phonebook contact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryContact {
    /// Position of the contact in the phonebook (`idx` marker)
    pub contact_id: Option<String>,
    pub unique_id: Option<String>,
    pub category: String,
    pub display_name: String,
    pub numbers: Vec<ContactNumber>,
}

impl DirectoryContact {
    pub fn new(display_name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            contact_id: None,
            unique_id: None,
            category: "0".to_string(),
            display_name: display_name.into(),
            numbers: vec![ContactNumber::home(number, 0)],
        }
    }

    pub fn has_number(&self, number: &str) -> bool {
        self.numbers.iter().any(|n| n.number == number)
    }

    /// Add `number` unless present. Quick-dial slots are dropped from the
    /// existing numbers, the device refuses documents that repeat them.
    pub fn append_number(&mut self, number: &str) -> bool {
        if self.has_number(number) {
            return false;
        }
        for existing in &mut self.numbers {
            existing.quickdial = None;
        }
        let next_id = self
            .numbers
            .iter()
            .filter_map(|n| n.id.as_deref()?.parse::<usize>().ok())
            .max()
            .map_or(self.numbers.len(), |max| max + 1);
        self.numbers.push(ContactNumber::home(number, next_id));
        true
    }
}

#[derive(Clone, Copy)]
enum Field {
    Category,
    RealName,
    Number,
    UniqueId,
}

/// Parse every `<contact>` of a phonebook or contact document
pub fn parse_contacts(xml: &str) -> Result<Vec<DirectoryContact>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut contacts = Vec::new();
    let mut pending_idx: Option<String> = None;
    let mut current: Option<DirectoryContact> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Comment(comment) => {
                let text = String::from_utf8_lossy(&comment);
                if let Some(idx) = text.trim().strip_prefix("idx:") {
                    pending_idx = Some(idx.trim().to_string());
                }
            }
            Event::Start(e) => match e.name().as_ref() {
                b"contact" => {
                    current = Some(DirectoryContact {
                        contact_id: pending_idx.take(),
                        ..Default::default()
                    });
                }
                b"category" => field = Some(Field::Category),
                b"realName" => field = Some(Field::RealName),
                b"uniqueid" => field = Some(Field::UniqueId),
                b"number" => {
                    if let Some(contact) = current.as_mut() {
                        contact.numbers.push(parse_number_attributes(&e)?);
                        field = Some(Field::Number);
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let (Some(f), Some(contact)) = (field, current.as_mut()) {
                    let text = e.unescape()?.into_owned();
                    match f {
                        Field::Category => contact.category = text,
                        Field::RealName => contact.display_name = text,
                        Field::UniqueId => contact.unique_id = Some(text),
                        Field::Number => {
                            if let Some(number) = contact.numbers.last_mut() {
                                number.number = text;
                            }
                        }
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"contact" => {
                    if let Some(mut contact) = current.take() {
                        // Empty <number/> slots carry no information
                        contact.numbers.retain(|n| !n.number.is_empty());
                        contacts.push(contact);
                    }
                    field = None;
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(contacts)
}

fn parse_number_attributes(e: &BytesStart<'_>) -> Result<ContactNumber> {
    let mut number = ContactNumber {
        number: String::new(),
        kind: String::new(),
        prio: None,
        id: None,
        quickdial: None,
        vanity: None,
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::xml(e.to_string()))?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"type" => number.kind = value,
            b"prio" => number.prio = Some(value),
            b"id" => number.id = Some(value),
            b"quickdial" => number.quickdial = Some(value),
            b"vanity" => number.vanity = Some(value),
            _ => {}
        }
    }
    Ok(number)
}

/// Serializes a contact into the document the device stores
pub struct ContactBuilder {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl ContactBuilder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    /// Build the full entry document for `contact`
    pub fn build(mut self, contact: &DirectoryContact) -> Result<String> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut envelope = BytesStart::new("Envelope");
        envelope.push_attribute(("xmlns:s", SOAP_ENVELOPE_NS));
        envelope.push_attribute(("s:encodingStyle", SOAP_ENCODING));
        self.event(Event::Start(envelope))?;

        self.start("contact")?;
        self.text_element("category", &contact.category)?;
        self.start("person")?;
        self.text_element("realName", &contact.display_name)?;
        self.end("person")?;

        let mut telephony = BytesStart::new("telephony");
        telephony.push_attribute(("nid", contact.numbers.len().to_string().as_str()));
        self.event(Event::Start(telephony))?;
        for number in &contact.numbers {
            let mut elem = BytesStart::new("number");
            elem.push_attribute(("type", number.kind.as_str()));
            for (key, value) in [
                ("prio", &number.prio),
                ("id", &number.id),
                ("quickdial", &number.quickdial),
                ("vanity", &number.vanity),
            ] {
                if let Some(value) = value {
                    elem.push_attribute((key, value.as_str()));
                }
            }
            self.event(Event::Start(elem))?;
            self.event(Event::Text(BytesText::new(&number.number)))?;
            self.end("number")?;
        }
        self.end("telephony")?;

        if let Some(uid) = &contact.unique_id {
            self.text_element("uniqueid", uid)?;
        }
        self.end("contact")?;
        self.end("Envelope")?;

        String::from_utf8(self.writer.into_inner().into_inner()).map_err(|e| Error::xml(e.to_string()))
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::xml(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }
}
