//! The in-memory view of one fixed-capacity page.
//!
//! A small fixed header is followed by a body whose layout is derived
//! deterministically from `count` and `split`, plus explicit offset
//! bookkeeping rather than per-entry length prefixes. Rather than slicing
//! directly into a shared byte slab with in-place slot-directory mutation,
//! this crate keeps a page's entries as an owned, ordered `Vec<Entry>` and
//! derives the same byte-cost accounting from it — see `DESIGN.md` for why
//! that trade was made.
//! [`encode`](Page::encode)/[`decode`](Page::decode) still produce and
//! parse one fixed on-disk layout, so the persistent file format is
//! unaffected by the in-memory representation.

use crate::error::{Result, TreeError};
use crate::types::{PageDepth, PageLink, PageSize};

/// Fixed-size prefix written ahead of every page's body, in bytes.
pub const HEADER_LEN: usize = 20;

/// Number of bytes a cumulative end-offset slot costs in an array region.
const END_SLOT_LEN: usize = 4;

/// Bit flags packed into [`PageHeader::flags`].
mod flag {
    pub const FREE: u8 = 1 << 0;
    pub const MODIFIED: u8 = 1 << 1;
    pub const PERSISTENT: u8 = 1 << 2;
    pub const RECOVER: u8 = 1 << 3;
    pub const STORED: u8 = 1 << 4;
}

/// Fixed prefix of every page.
#[derive(Clone, Copy, Debug)]
pub struct PageHeader {
    pub link: PageLink,
    pub free: bool,
    pub modified: bool,
    pub persistent: bool,
    pub recover: bool,
    pub stored: bool,
    pub depth: PageDepth,
    pub capacity: PageSize,
    pub count: u16,
    /// 0 = no split value; for a scalar value shape, 1 marks it present;
    /// for an array value shape, the byte length of the split value.
    pub split: u16,
}

impl PageHeader {
    pub fn new(link: PageLink, capacity: PageSize, depth: PageDepth) -> Self {
        PageHeader {
            link,
            free: false,
            modified: false,
            persistent: false,
            recover: false,
            stored: false,
            depth,
            capacity,
            count: 0,
            split: 0,
        }
    }

    fn flags(&self) -> u8 {
        let mut f = 0u8;
        if self.free {
            f |= flag::FREE;
        }
        if self.modified {
            f |= flag::MODIFIED;
        }
        if self.persistent {
            f |= flag::PERSISTENT;
        }
        if self.recover {
            f |= flag::RECOVER;
        }
        if self.stored {
            f |= flag::STORED;
        }
        f
    }

    fn from_flags(f: u8) -> (bool, bool, bool, bool, bool) {
        (
            f & flag::FREE != 0,
            f & flag::MODIFIED != 0,
            f & flag::PERSISTENT != 0,
            f & flag::RECOVER != 0,
            f & flag::STORED != 0,
        )
    }

    pub(crate) fn encode(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= HEADER_LEN);
        out[0..4].copy_from_slice(&self.link.to_bytes());
        out[4] = self.flags();
        out[5..7].copy_from_slice(&self.depth.to_le_bytes());
        out[7..9].copy_from_slice(&self.capacity.to_le_bytes());
        out[9..11].copy_from_slice(&self.count.to_le_bytes());
        out[11..13].copy_from_slice(&self.split.to_le_bytes());
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(TreeError::Corruption("page header truncated".into()));
        }
        let link = PageLink::from_bytes(&bytes[0..4]);
        let (free, modified, persistent, recover, stored) = Self::from_flags(bytes[4]);
        let depth = u16::from_le_bytes(bytes[5..7].try_into().unwrap());
        let capacity = u16::from_le_bytes(bytes[7..9].try_into().unwrap());
        let count = u16::from_le_bytes(bytes[9..11].try_into().unwrap());
        let split = u16::from_le_bytes(bytes[11..13].try_into().unwrap());
        Ok(PageHeader {
            link,
            free,
            modified,
            persistent,
            recover,
            stored,
            depth,
            capacity,
            count,
            split,
        })
    }
}

/// Key/value shape of a page's body: a trait/generic-driven runtime
/// descriptor standing in for what a template-dispatched implementation
/// would resolve at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    /// `Some(n)` for a fixed-width scalar key, `None` for an array key.
    pub key_elem_size: Option<u16>,
    /// `Some(n)` for a fixed-width scalar value, `None` for an array value.
    pub value_elem_size: Option<u16>,
}

impl Shape {
    pub fn new(key_elem_size: Option<u16>, value_elem_size: Option<u16>) -> Self {
        Shape {
            key_elem_size,
            value_elem_size,
        }
    }

    /// The shape used by node pages for a given key shape: node values are
    /// always a 4-byte `PageLink`, never stored as an array shape.
    pub fn node_shape(key_elem_size: Option<u16>) -> Self {
        Shape::new(key_elem_size, Some(4))
    }
}

/// One indexed (key, value) pair on a page.
#[derive(Clone, Debug)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// The in-memory view of one fixed-capacity page.
#[derive(Clone, Debug)]
pub struct Page {
    pub header: PageHeader,
    pub shape: Shape,
    pub entries: Vec<Entry>,
    pub split: Option<Vec<u8>>,
}

impl Page {
    /// A freshly allocated, empty page of the given shape.
    pub fn new(link: PageLink, capacity: PageSize, depth: PageDepth, shape: Shape) -> Self {
        Page {
            header: PageHeader::new(link, capacity, depth),
            shape,
            entries: Vec::new(),
            split: None,
        }
    }

    /// Bytes currently occupied: header + split + indexed entries.
    pub fn filling(&self) -> PageSize {
        let mut total = HEADER_LEN + self.split_cost();
        for e in &self.entries {
            total += self.entry_cost(e.key.len(), e.value.len());
        }
        total as PageSize
    }

    /// Byte cost a (not yet inserted) entry of the given sizes would add.
    pub fn entry_filling(&self, key_size: usize, value_size: usize) -> PageSize {
        self.entry_cost(key_size, value_size) as PageSize
    }

    /// Whether an entry of the given sizes would fit without exceeding
    /// capacity.
    pub fn entry_fit(&self, key_size: usize, value_size: usize) -> bool {
        self.filling() as u32 + self.entry_filling(key_size, value_size) as u32
            <= self.header.capacity as u32
    }

    fn entry_cost(&self, key_len: usize, value_len: usize) -> usize {
        let key_cost = match self.shape.key_elem_size {
            Some(sz) => sz as usize,
            None => END_SLOT_LEN + key_len,
        };
        let value_cost = match self.shape.value_elem_size {
            Some(sz) => sz as usize,
            None => END_SLOT_LEN + value_len,
        };
        key_cost + value_cost
    }

    /// Byte cost of the split value. Unlike an ordinary array-shaped
    /// entry, the split's length is recorded directly in the header
    /// (`PageHeader::split`), not via an end-offset table slot, so an
    /// array value shape costs only its raw bytes here.
    fn split_cost(&self) -> usize {
        match &self.split {
            None => 0,
            Some(bytes) => match self.shape.value_elem_size {
                Some(sz) => sz as usize,
                None => bytes.len(),
            },
        }
    }

    fn fits_capacity(&self, extra: usize) -> bool {
        self.filling() as usize + extra <= self.header.capacity as usize
    }

    // -- split slot -------------------------------------------------

    pub fn split_defined(&self) -> bool {
        self.split.is_some()
    }

    pub fn split(&self) -> Option<&[u8]> {
        self.split.as_deref()
    }

    pub fn split_size(&self) -> u16 {
        self.header.split
    }

    pub fn split_value_size(&self) -> Option<usize> {
        self.split.as_ref().map(|v| v.len())
    }

    pub fn set_split(&mut self, value: Vec<u8>) -> Result<()> {
        let old_cost = self.split_cost();
        let new_cost = match self.shape.value_elem_size {
            Some(sz) => sz as usize,
            None => value.len(),
        };
        if self.filling() as usize - old_cost + new_cost > self.header.capacity as usize {
            return Err(TreeError::Overflow);
        }
        let len = value.len();
        self.split = Some(value);
        self.header.split = if self.shape.value_elem_size.is_some() {
            1
        } else {
            len as u16
        };
        Ok(())
    }

    pub fn remove_split(&mut self) {
        self.split = None;
        self.header.split = 0;
    }

    // -- indexed entry accessors -------------------------------------

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.entries.len() {
            Err(TreeError::InvalidIndex(i))
        } else {
            Ok(())
        }
    }

    pub fn key(&self, i: usize) -> Result<&[u8]> {
        self.check_index(i)?;
        Ok(&self.entries[i].key)
    }

    pub fn key_size(&self, i: usize) -> Result<usize> {
        Ok(self.key(i)?.len())
    }

    pub fn value(&self, i: usize) -> Result<&[u8]> {
        self.check_index(i)?;
        Ok(&self.entries[i].value)
    }

    pub fn value_size(&self, i: usize) -> Result<usize> {
        Ok(self.value(i)?.len())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    fn validate_key_value(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.shape.key_elem_size.is_none() && key.is_empty() {
            return Err(TreeError::InvalidKeySize);
        }
        if self.shape.value_elem_size.is_none() && value.is_empty() {
            return Err(TreeError::InvalidValueSize);
        }
        Ok(())
    }

    /// Insert a new entry at `i`, shifting later entries right.
    ///
    /// The caller (the `Tree`) is responsible for ordering; `Page` does not
    /// re-validate it. When `copy` is supplied, the post-mutation image is
    /// written there instead, leaving `self` untouched.
    pub fn insert(
        &mut self,
        i: usize,
        key: Vec<u8>,
        value: Vec<u8>,
        copy: Option<&mut Page>,
    ) -> Result<()> {
        if i > self.entries.len() {
            return Err(TreeError::InvalidIndex(i));
        }
        self.validate_key_value(&key, &value)?;
        let cost = self.entry_cost(key.len(), value.len());
        if !self.fits_capacity(cost) {
            return Err(TreeError::Overflow);
        }
        let dst = copy.unwrap_or(self);
        dst_apply(dst, |p| {
            p.entries.insert(i, Entry { key, value });
            p.header.count = p.entries.len() as u16;
        });
        Ok(())
    }

    /// Replace the value (and, optionally, the key) at `i`.
    pub fn replace(
        &mut self,
        i: usize,
        key: Option<Vec<u8>>,
        value: Vec<u8>,
        copy: Option<&mut Page>,
    ) -> Result<()> {
        self.check_index(i)?;
        let new_key_len = key.as_ref().map(|k| k.len()).unwrap_or(self.entries[i].key.len());
        if self.shape.key_elem_size.is_none() && key.as_ref().is_some_and(|k| k.is_empty()) {
            return Err(TreeError::InvalidKeySize);
        }
        if self.shape.value_elem_size.is_none() && value.is_empty() {
            return Err(TreeError::InvalidValueSize);
        }
        let old_cost = self.entry_cost(self.entries[i].key.len(), self.entries[i].value.len());
        let new_cost = self.entry_cost(new_key_len, value.len());
        if self.filling() as usize - old_cost + new_cost > self.header.capacity as usize {
            return Err(TreeError::Overflow);
        }
        let dst = copy.unwrap_or(self);
        dst_apply(dst, |p| {
            if let Some(k) = key {
                p.entries[i].key = k;
            }
            p.entries[i].value = value;
        });
        Ok(())
    }

    /// Remove the entry at `i`, shifting later entries left.
    pub fn remove(&mut self, i: usize, copy: Option<&mut Page>) -> Result<()> {
        self.check_index(i)?;
        let dst = copy.unwrap_or(self);
        dst_apply(dst, |p| {
            p.entries.remove(i);
            p.header.count = p.entries.len() as u16;
        });
        Ok(())
    }

    /// Move the suffix `[i, count)` of `self` onto the front of `dst`,
    /// retaining `[0, i)` in `self`.
    pub fn shift_right(&mut self, dst: &mut Page, i: usize) -> Result<()> {
        if i > self.entries.len() {
            return Err(TreeError::InvalidIndex(i));
        }
        let moving = &self.entries[i..];
        let extra: usize = moving
            .iter()
            .map(|e| self.entry_cost(e.key.len(), e.value.len()))
            .sum();
        if !dst.fits_capacity(extra) {
            return Err(TreeError::Overflow);
        }
        let tail = self.entries.split_off(i);
        let mut combined = tail;
        combined.extend(dst.entries.drain(..));
        dst.entries = combined;
        self.header.count = self.entries.len() as u16;
        dst.header.count = dst.entries.len() as u16;
        Ok(())
    }

    /// Move the prefix `[0, i)` of `self` onto the back of `dst`,
    /// retaining `[i, count)` in `self`.
    pub fn shift_left(&mut self, dst: &mut Page, i: usize) -> Result<()> {
        if i > self.entries.len() {
            return Err(TreeError::InvalidIndex(i));
        }
        let moving = &self.entries[..i];
        let extra: usize = moving
            .iter()
            .map(|e| self.entry_cost(e.key.len(), e.value.len()))
            .sum();
        if !dst.fits_capacity(extra) {
            return Err(TreeError::Overflow);
        }
        let rest = self.entries.split_off(i);
        dst.entries.extend(self.entries.drain(..));
        self.entries = rest;
        self.header.count = self.entries.len() as u16;
        dst.header.count = dst.entries.len() as u16;
        Ok(())
    }

    // -- persistent encode/decode -------------------------------------

    /// Serialize to this page's exact on-disk layout.
    pub fn encode(&self) -> Vec<u8> {
        let cap = self.header.capacity as usize;
        let mut buf = vec![0u8; cap];
        self.header.encode(&mut buf[..HEADER_LEN]);
        let body = &mut buf[HEADER_LEN..];
        let key_scalar = self.shape.key_elem_size;
        let value_scalar = self.shape.value_elem_size;
        let split_bytes: &[u8] = self.split.as_deref().unwrap_or(&[]);

        let mut cursor = 0usize;
        body[cursor..cursor + split_bytes.len()].copy_from_slice(split_bytes);
        cursor += split_bytes.len();

        match (key_scalar, value_scalar) {
            (Some(_), Some(_)) => {
                for e in &self.entries {
                    body[cursor..cursor + e.key.len()].copy_from_slice(&e.key);
                    cursor += e.key.len();
                }
                for e in &self.entries {
                    body[cursor..cursor + e.value.len()].copy_from_slice(&e.value);
                    cursor += e.value.len();
                }
            }
            (None, Some(_)) => {
                for e in &self.entries {
                    body[cursor..cursor + e.value.len()].copy_from_slice(&e.value);
                    cursor += e.value.len();
                }
                let mut acc = 0u32;
                for e in &self.entries {
                    acc += e.key.len() as u32;
                    body[cursor..cursor + 4].copy_from_slice(&acc.to_le_bytes());
                    cursor += 4;
                }
                for e in &self.entries {
                    body[cursor..cursor + e.key.len()].copy_from_slice(&e.key);
                    cursor += e.key.len();
                }
            }
            (Some(_), None) => {
                for e in &self.entries {
                    body[cursor..cursor + e.key.len()].copy_from_slice(&e.key);
                    cursor += e.key.len();
                }
                let mut acc = 0u32;
                for e in &self.entries {
                    acc += e.value.len() as u32;
                    body[cursor..cursor + 4].copy_from_slice(&acc.to_le_bytes());
                    cursor += 4;
                }
                for e in &self.entries {
                    body[cursor..cursor + e.value.len()].copy_from_slice(&e.value);
                    cursor += e.value.len();
                }
            }
            (None, None) => {
                let mut acc = 0u32;
                for e in &self.entries {
                    acc += e.key.len() as u32;
                    body[cursor..cursor + 4].copy_from_slice(&acc.to_le_bytes());
                    cursor += 4;
                }
                let mut acc = 0u32;
                for e in &self.entries {
                    acc += e.value.len() as u32;
                    body[cursor..cursor + 4].copy_from_slice(&acc.to_le_bytes());
                    cursor += 4;
                }
                for e in &self.entries {
                    body[cursor..cursor + e.key.len()].copy_from_slice(&e.key);
                    cursor += e.key.len();
                }
                for e in &self.entries {
                    body[cursor..cursor + e.value.len()].copy_from_slice(&e.value);
                    cursor += e.value.len();
                }
            }
        }
        buf
    }

    /// Parse a page previously produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8], shape: Shape) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(TreeError::Corruption("page shorter than header".into()));
        }
        let header = PageHeader::decode(bytes)?;
        let body = &bytes[HEADER_LEN..];
        let count = header.count as usize;

        let split_len = if header.split == 0 {
            0
        } else {
            shape.value_elem_size.map(|sz| sz as usize).unwrap_or(header.split as usize)
        };
        if split_len > body.len() {
            return Err(TreeError::Corruption("split value exceeds page body".into()));
        }
        let split = if header.split == 0 {
            None
        } else {
            Some(body[..split_len].to_vec())
        };
        let mut cursor = split_len;

        let read_end_table = |cursor: &mut usize, n: usize| -> Result<Vec<u32>> {
            let mut ends = Vec::with_capacity(n);
            for _ in 0..n {
                if *cursor + 4 > body.len() {
                    return Err(TreeError::Corruption("end table truncated".into()));
                }
                let v = u32::from_le_bytes(body[*cursor..*cursor + 4].try_into().unwrap());
                ends.push(v);
                *cursor += 4;
            }
            Ok(ends)
        };

        let entries = match (shape.key_elem_size, shape.value_elem_size) {
            (Some(ksz), Some(vsz)) => {
                let (ksz, vsz) = (ksz as usize, vsz as usize);
                let mut keys = Vec::with_capacity(count);
                for _ in 0..count {
                    keys.push(body[cursor..cursor + ksz].to_vec());
                    cursor += ksz;
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(body[cursor..cursor + vsz].to_vec());
                    cursor += vsz;
                }
                keys.into_iter()
                    .zip(values)
                    .map(|(key, value)| Entry { key, value })
                    .collect()
            }
            (None, Some(vsz)) => {
                let vsz = vsz as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(body[cursor..cursor + vsz].to_vec());
                    cursor += vsz;
                }
                let ends = read_end_table(&mut cursor, count)?;
                let mut keys = Vec::with_capacity(count);
                let mut prev = 0u32;
                for end in &ends {
                    let (start, end) = (prev as usize, *end as usize);
                    if end < start || cursor + (end - start) > body.len() {
                        return Err(TreeError::Corruption("key data truncated".into()));
                    }
                    keys.push(body[cursor + start..cursor + end].to_vec());
                    prev = end as u32;
                }
                values
                    .into_iter()
                    .zip(keys)
                    .map(|(value, key)| Entry { key, value })
                    .collect()
            }
            (Some(ksz), None) => {
                let ksz = ksz as usize;
                let mut keys = Vec::with_capacity(count);
                for _ in 0..count {
                    keys.push(body[cursor..cursor + ksz].to_vec());
                    cursor += ksz;
                }
                let ends = read_end_table(&mut cursor, count)?;
                let mut values = Vec::with_capacity(count);
                let mut prev = 0u32;
                for end in &ends {
                    let (start, end) = (prev as usize, *end as usize);
                    if end < start || cursor + (end - start) > body.len() {
                        return Err(TreeError::Corruption("value data truncated".into()));
                    }
                    values.push(body[cursor + start..cursor + end].to_vec());
                    prev = end as u32;
                }
                keys.into_iter()
                    .zip(values)
                    .map(|(key, value)| Entry { key, value })
                    .collect()
            }
            (None, None) => {
                let key_ends = read_end_table(&mut cursor, count)?;
                let val_ends = read_end_table(&mut cursor, count)?;
                let mut keys = Vec::with_capacity(count);
                let mut prev = 0u32;
                for end in &key_ends {
                    let (start, end) = (prev as usize, *end as usize);
                    if end < start || cursor + (end - start) > body.len() {
                        return Err(TreeError::Corruption("key data truncated".into()));
                    }
                    keys.push(body[cursor + start..cursor + end].to_vec());
                    prev = end as u32;
                }
                cursor += key_ends.last().copied().unwrap_or(0) as usize;
                let mut values = Vec::with_capacity(count);
                let mut prev = 0u32;
                for end in &val_ends {
                    let (start, end) = (prev as usize, *end as usize);
                    if end < start || cursor + (end - start) > body.len() {
                        return Err(TreeError::Corruption("value data truncated".into()));
                    }
                    values.push(body[cursor + start..cursor + end].to_vec());
                    prev = end as u32;
                }
                keys.into_iter()
                    .zip(values)
                    .map(|(key, value)| Entry { key, value })
                    .collect()
            }
        };

        Ok(Page {
            header,
            shape,
            entries,
            split,
        })
    }
}

/// Apply `f` to `target`: the mutation either lands fully on `self` or
/// fully on the caller-supplied copy, never a mix of the two.
fn dst_apply(target: &mut Page, f: impl FnOnce(&mut Page)) {
    f(target);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_shape() -> Shape {
        Shape::new(Some(4), Some(4))
    }

    #[test]
    fn insert_and_read_back() {
        let mut page = Page::new(PageLink(1), 256, 0, scalar_shape());
        page.insert(0, 1u32.to_le_bytes().to_vec(), 100u32.to_le_bytes().to_vec(), None)
            .unwrap();
        page.insert(1, 2u32.to_le_bytes().to_vec(), 200u32.to_le_bytes().to_vec(), None)
            .unwrap();
        assert_eq!(page.count(), 2);
        assert_eq!(page.key(0).unwrap(), &1u32.to_le_bytes());
        assert_eq!(page.value(1).unwrap(), &200u32.to_le_bytes());
    }

    #[test]
    fn insert_out_of_range_fails() {
        let mut page = Page::new(PageLink(1), 256, 0, scalar_shape());
        let err = page
            .insert(5, 1u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec(), None)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidIndex(5)));
    }

    #[test]
    fn overflow_when_capacity_exceeded() {
        let mut page = Page::new(PageLink(1), HEADER_LEN as PageSize + 8, 0, scalar_shape());
        page.insert(0, 1u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec(), None)
            .unwrap();
        let err = page
            .insert(1, 2u32.to_le_bytes().to_vec(), 2u32.to_le_bytes().to_vec(), None)
            .unwrap_err();
        assert!(matches!(err, TreeError::Overflow));
    }

    #[test]
    fn copy_target_leaves_source_untouched() {
        let mut page = Page::new(PageLink(1), 256, 0, scalar_shape());
        page.insert(0, 1u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec(), None)
            .unwrap();
        let mut copy = page.clone();
        page.insert(
            1,
            2u32.to_le_bytes().to_vec(),
            2u32.to_le_bytes().to_vec(),
            Some(&mut copy),
        )
        .unwrap();
        assert_eq!(page.count(), 1);
        assert_eq!(copy.count(), 2);
    }

    #[test]
    fn array_shape_round_trips_through_encode_decode() {
        let shape = Shape::new(None, None);
        let mut page = Page::new(PageLink(3), 512, 0, shape);
        page.insert(0, b"alpha".to_vec(), b"1".to_vec(), None).unwrap();
        page.insert(1, b"beta".to_vec(), b"22".to_vec(), None).unwrap();
        page.set_split(b"zzz".to_vec()).unwrap();
        let bytes = page.encode();
        let decoded = Page::decode(&bytes, shape).unwrap();
        assert_eq!(decoded.count(), 2);
        assert_eq!(decoded.key(0).unwrap(), b"alpha");
        assert_eq!(decoded.value(1).unwrap(), b"22");
        assert_eq!(decoded.split(), Some(&b"zzz"[..]));
    }

    #[test]
    fn shift_left_moves_prefix() {
        let mut left = Page::new(PageLink(1), 256, 0, scalar_shape());
        let mut right = Page::new(PageLink(2), 256, 0, scalar_shape());
        for i in 0..4u32 {
            left.insert(i as usize, i.to_le_bytes().to_vec(), i.to_le_bytes().to_vec(), None)
                .unwrap();
        }
        left.shift_left(&mut right, 2).unwrap();
        assert_eq!(left.count(), 2);
        assert_eq!(right.count(), 2);
        assert_eq!(right.key(0).unwrap(), &0u32.to_le_bytes());
        assert_eq!(left.key(0).unwrap(), &2u32.to_le_bytes());
    }
}
