//! Fixed-width text fields.

use std::fmt;

/// A 32-byte label as carried on the wire.
///
/// Devices pad labels with NUL bytes; [`Label::text`] strips the trailing ones.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::Label;
///
/// let label = Label::new("Kitchen");
/// assert_eq!(label.text(), "Kitchen");
/// assert_eq!(label.as_bytes().len(), 32);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde_with::SerializeDisplay)]
pub struct Label([u8; Label::LEN]);

impl Label {
    pub const LEN: usize = 32;

    /// Build a label from text, truncating at a character boundary if it does
    /// not fit in 32 bytes.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(Self::LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0u8; Self::LEN];
        bytes[..end].copy_from_slice(&text.as_bytes()[..end]);
        Label(bytes)
    }

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Label(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// The label text with trailing NUL padding removed.
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |idx| idx + 1);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl Default for Label {
    fn default() -> Self {
        Label([0; Self::LEN])
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", self.text())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
