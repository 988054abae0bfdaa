//! Dynamic-bytes class: `String` and `bytes::Bytes`.

use bytes::Bytes;

use crate::flat_bytes;
use crate::traits::{DynamicSize, FileIdentified, FileIdentifier};

impl DynamicSize for String {
    fn save(&self) -> Vec<&[u8]> {
        vec![self.as_bytes()]
    }

    // The wire format carries raw bytes with no UTF-8 guarantee; a foreign
    // sender's invalid sequences are replaced rather than rejected, in line
    // with the reader's bounds-only validation.
    fn load(&mut self, bytes: &[u8]) {
        *self = String::from_utf8_lossy(bytes).into_owned();
    }
}

flat_bytes!(String);

impl FileIdentified for String {
    const FILE_IDENTIFIER: FileIdentifier = 15694229;
}

impl DynamicSize for Bytes {
    fn save(&self) -> Vec<&[u8]> {
        vec![&self[..]]
    }

    fn load(&mut self, bytes: &[u8]) {
        *self = Bytes::copy_from_slice(bytes);
    }
}

flat_bytes!(Bytes);
