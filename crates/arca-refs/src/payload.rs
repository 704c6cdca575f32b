//! Structured payloads.
//!
//! A [`Document`] is an ordered list of named fields. Two field kinds link
//! to other content: [`FieldValue::BinaryAttachment`] names opaque bytes by
//! content id, and [`FieldValue::ObjectAttachment`] names a blob that holds
//! another encoded `Document`. Everything else is plain data.
//!
//! Decoding refuses payloads whose objects and arrays nest deeper than
//! [`MAX_NESTING_DEPTH`], so every decoded document can be walked and
//! dropped without exhausting the stack.

use std::cell::Cell;

use arca_types::{BlobId, ContentId};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PayloadError;

/// Deepest object/array nesting [`Document::decode`] accepts.
pub const MAX_NESTING_DEPTH: usize = 128;

thread_local! {
    static DECODE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of decode nesting for as long as it lives.
struct NestingGuard;

impl NestingGuard {
    fn enter<E: serde::de::Error>() -> Result<Self, E> {
        DECODE_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > MAX_NESTING_DEPTH {
                return Err(E::custom(format!(
                    "nesting exceeds maximum depth {MAX_NESTING_DEPTH}"
                )));
            }
            depth.set(next);
            Ok(NestingGuard)
        })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        DECODE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn nested<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let _level = NestingGuard::enter::<D::Error>()?;
    T::deserialize(deserializer)
}

/// A single field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Object(#[serde(deserialize_with = "nested")] Document),
    Array(#[serde(deserialize_with = "nested")] Vec<FieldValue>),
    /// Opaque content named by alias (or directly by blob hash).
    BinaryAttachment(ContentId),
    /// A blob holding another encoded [`Document`].
    ObjectAttachment(BlobId),
}

impl FieldValue {
    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::BinaryAttachment(_) | Self::ObjectAttachment(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// A link from a document to other content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attachment {
    Binary(ContentId),
    Object(BlobId),
}

/// An ordered collection of named fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field append.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    /// First field with the given name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Walk every field in order, descending into nested objects and
    /// arrays. Array items are reported under the array's field name.
    pub fn walk<V: DocumentVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut stack = vec![Frame::Fields(self.fields.iter())];
        loop {
            let next = match stack.last_mut() {
                None => break,
                Some(Frame::Fields(fields)) => fields.next().map(|f| (f.name.as_str(), &f.value)),
                Some(Frame::Items(name, items)) => {
                    let name = *name;
                    items.next().map(|item| (name, item))
                }
            };
            let Some((name, value)) = next else {
                stack.pop();
                continue;
            };
            match value {
                FieldValue::Object(document) => {
                    if visitor.visit_object(name, document) {
                        stack.push(Frame::Fields(document.fields.iter()));
                    }
                }
                FieldValue::Array(items) => stack.push(Frame::Items(name, items.iter())),
                FieldValue::BinaryAttachment(id) => visitor.visit_binary_attachment(name, id),
                FieldValue::ObjectAttachment(id) => visitor.visit_object_attachment(name, id),
                scalar => visitor.visit_scalar(name, scalar),
            }
        }
    }

    /// Attachments of this document and its nested objects, in field
    /// order. Attached object blobs are not followed.
    pub fn attachments(&self) -> Vec<Attachment> {
        let mut collector = AttachmentCollector::default();
        self.walk(&mut collector);
        collector.found
    }

    pub fn has_attachments(&self) -> bool {
        let mut scan = AttachmentScan(false);
        self.walk(&mut scan);
        scan.0
    }

    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        bincode::serialize(self).map_err(|e| PayloadError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        bincode::deserialize(bytes).map_err(|e| PayloadError(e.to_string()))
    }

    /// Blob id of the encoded document.
    pub fn blob_id(&self) -> Result<BlobId, PayloadError> {
        Ok(arca_crypto::blob_id(&self.encode()?))
    }
}

/// Callbacks for [`Document::walk`]. Every method defaults to doing
/// nothing; [`visit_object`](Self::visit_object) returns whether to
/// descend into the nested document.
pub trait DocumentVisitor {
    fn visit_scalar(&mut self, _name: &str, _value: &FieldValue) {}

    fn visit_object(&mut self, _name: &str, _document: &Document) -> bool {
        true
    }

    fn visit_binary_attachment(&mut self, _name: &str, _content_id: &ContentId) {}

    fn visit_object_attachment(&mut self, _name: &str, _blob: &BlobId) {}
}

/// Pending work of [`Document::walk`].
enum Frame<'a> {
    Fields(std::slice::Iter<'a, Field>),
    Items(&'a str, std::slice::Iter<'a, FieldValue>),
}

#[derive(Default)]
struct AttachmentCollector {
    found: Vec<Attachment>,
}

impl DocumentVisitor for AttachmentCollector {
    fn visit_binary_attachment(&mut self, _name: &str, content_id: &ContentId) {
        self.found.push(Attachment::Binary(*content_id));
    }

    fn visit_object_attachment(&mut self, _name: &str, blob: &BlobId) {
        self.found.push(Attachment::Object(*blob));
    }
}

struct AttachmentScan(bool);

impl DocumentVisitor for AttachmentScan {
    fn visit_object(&mut self, _name: &str, _document: &Document) -> bool {
        !self.0
    }

    fn visit_binary_attachment(&mut self, _name: &str, _content_id: &ContentId) {
        self.0 = true;
    }

    fn visit_object_attachment(&mut self, _name: &str, _blob: &BlobId) {
        self.0 = true;
    }
}
