//! Descriptor framing: tag, length and opaque data.
//!
//! Only the framing is handled here; the meaning of descriptor payloads is
//! left to the caller.

/// Largest descriptor payload.
pub const DESCRIPTOR_DATA_MAX: usize = 255;

/// One descriptor borrowed from a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a>(&'a [u8]);

impl<'a> Descriptor<'a> {
    pub fn tag(&self) -> u8 {
        self.0[0]
    }

    pub fn data(&self) -> &'a [u8] {
        &self.0[2..]
    }

    /// Whole descriptor including tag and length.
    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }
}

/// Concatenated descriptors.
///
/// [`DescriptorList::pop`] splits off the first descriptor; a truncated
/// descriptor ends the list. The iterator does the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorList<'a>(&'a [u8]);

impl<'a> DescriptorList<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DescriptorList(data)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }

    /// First descriptor and the remaining list. Returns `(None, empty)` if
    /// the list is empty or its first descriptor is truncated.
    pub fn pop(self) -> (Option<Descriptor<'a>>, DescriptorList<'a>) {
        if self.0.len() < 2 {
            return (None, DescriptorList::default());
        }
        let l = self.0[1] as usize + 2;
        if self.0.len() < l {
            return (None, DescriptorList::default());
        }
        (Some(Descriptor(&self.0[..l])), DescriptorList(&self.0[l..]))
    }

    /// First descriptor with the given tag.
    pub fn find(self, tag: u8) -> Option<Descriptor<'a>> {
        self.into_iter().find(|d| d.tag() == tag)
    }
}

impl<'a> IntoIterator for DescriptorList<'a> {
    type Item = Descriptor<'a>;
    type IntoIter = DescriptorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        DescriptorIter(self)
    }
}

pub struct DescriptorIter<'a>(DescriptorList<'a>);

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (d, rest) = self.0.pop();
        self.0 = rest;
        d
    }
}

/// Builder of a descriptor loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorListBuf(Vec<u8>);

impl DescriptorListBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor with `len` data bytes and returns the data part
    /// for writing.
    ///
    /// # Panics
    /// If `len > 255`.
    pub fn alloc(&mut self, tag: u8, len: usize) -> &mut [u8] {
        assert!(
            len <= DESCRIPTOR_DATA_MAX,
            "descriptor data too long: {} bytes",
            len
        );
        let m = self.0.len();
        self.0.reserve(2 + len);
        self.0.push(tag);
        self.0.push(len as u8);
        self.0.resize(m + 2 + len, 0);
        &mut self.0[m + 2..]
    }

    /// Appends a descriptor.
    ///
    /// # Panics
    /// If `data` is longer than 255 bytes.
    pub fn push(&mut self, tag: u8, data: &[u8]) {
        self.alloc(tag, data.len()).copy_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_list(&self) -> DescriptorList<'_> {
        DescriptorList(&self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor_tag;

    #[test]
    fn test_build_and_pop() {
        let mut b = DescriptorListBuf::new();
        b.push(descriptor_tag::NETWORK_NAME, b"net");
        b.alloc(descriptor_tag::STREAM_IDENTIFIER, 1)[0] = 7;
        assert_eq!(b.bytes(), &[0x40, 3, b'n', b'e', b't', 0x52, 1, 7]);

        let (d, rest) = b.as_list().pop();
        let d = d.unwrap();
        assert_eq!(d.tag(), descriptor_tag::NETWORK_NAME);
        assert_eq!(d.data(), b"net");
        let (d, rest) = rest.pop();
        assert_eq!(d.unwrap().data(), &[7]);
        assert!(rest.is_empty());
        assert_eq!(rest.pop(), (None, DescriptorList::default()));
    }

    #[test]
    fn test_truncated_tail() {
        let raw = [0x48, 2, 1, 2, 0x40, 5, b'a'];
        let tags: Vec<u8> = DescriptorList::new(&raw).into_iter().map(|d| d.tag()).collect();
        assert_eq!(tags, vec![0x48]);
        assert!(DescriptorList::new(&raw).find(0x40).is_none());
        assert!(DescriptorList::new(&raw).find(0x48).is_some());
    }

    #[test]
    #[should_panic]
    fn test_data_too_long() {
        DescriptorListBuf::new().alloc(0x40, 256);
    }
}
