use std::fmt::{Debug, Formatter};
use std::iter::{DoubleEndedIterator, Enumerate, Extend, FromIterator};
use std::slice::Iter;
use std::vec::IntoIter as VecIntoIter;

/// Elements that take up a variable number of slots
pub trait Width {
    fn width(&self) -> usize;
}

/// Vector whose elements are addressed by the sum of the widths of the elements before them
///
/// Two places in a class file are indexed this way:
///
///   - the constant pool (longs and doubles take two indices, everything else takes one)
///   - operand stacks and locals (longs and doubles take two slots)
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, paired with their offset
    entries: Vec<(Offset, T)>,

    /// Offset the next pushed element will get
    offset_len: Offset,

    /// Offset of the first element (1 for the constant pool, 0 elsewhere)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty vector, whose first element will be at `initial_offset`
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset the next pushed element will get
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning its offset
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Remove the last entry, returning its offset, its index, and the entry
    pub fn pop(&mut self) -> Option<(Offset, usize, T)> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            (off, self.entries.len(), elem)
        })
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|(_, elem)| elem)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = self.initial_offset;
    }

    /// Look up the entry starting exactly at `offset` (binary search)
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    /// Look up an entry (and its offset) by its position
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

pub enum OffsetResult<'a, T> {
    /// Entry found, along with its index
    Ok(usize, &'a T),

    /// Offset falls in the middle of the entry before this index
    InvalidOffset(usize),

    /// Offset is past the end
    TooLarge,
}

impl<'a, T> OffsetResult<'a, T> {
    /// Keep only the entry, if one was found
    pub fn ok(&self) -> Option<&'a T> {
        match self {
            OffsetResult::Ok(_, found) => Some(found),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => None,
        }
    }
}

/// Iterator for owned `OffsetVec`
pub struct OffsetVecIntoIter<T>(Enumerate<VecIntoIter<(Offset, T)>>);

impl<T> Iterator for OffsetVecIntoIter<T> {
    type Item = (Offset, usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (off, idx, elem))
    }
}

impl<T> DoubleEndedIterator for OffsetVecIntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (off, idx, elem))
    }
}

impl<T> IntoIterator for OffsetVec<T> {
    type Item = (Offset, usize, T);
    type IntoIter = OffsetVecIntoIter<T>;

    fn into_iter(self) -> OffsetVecIntoIter<T> {
        OffsetVecIntoIter(self.entries.into_iter().enumerate())
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> DoubleEndedIterator for OffsetVecIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Width, const N: usize> From<[T; N]> for OffsetVec<T> {
    fn from(elems: [T; N]) -> Self {
        elems.into_iter().collect()
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Entry {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Entry {
        fn width(&self) -> usize {
            match self {
                Entry::Narrow(_) => 1,
                Entry::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_follow_widths() {
        let entries = OffsetVec::from([
            Entry::Narrow(1),
            Entry::Wide(2),
            Entry::Wide(3),
            Entry::Narrow(4),
        ]);
        assert_eq!(entries.offset_len(), Offset(6));
        assert_eq!(
            entries.into_iter().collect::<Vec<_>>(),
            vec![
                (Offset(0), 0, Entry::Narrow(1)),
                (Offset(1), 1, Entry::Wide(2)),
                (Offset(3), 2, Entry::Wide(3)),
                (Offset(5), 3, Entry::Narrow(4)),
            ]
        );
    }

    #[test]
    fn constant_pool_style_lookup() {
        let mut pool: OffsetVec<Entry> = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(pool.push(Entry::Narrow(1)), Offset(1));
        assert_eq!(pool.push(Entry::Wide(2)), Offset(2));
        assert_eq!(pool.push(Entry::Narrow(3)), Offset(4));

        assert_eq!(pool.get_offset(Offset(2)).ok(), Some(&Entry::Wide(2)));
        assert_eq!(pool.get_offset(Offset(4)).ok(), Some(&Entry::Narrow(3)));
        assert!(matches!(
            pool.get_offset(Offset(3)),
            OffsetResult::InvalidOffset(2)
        ));
        assert!(matches!(pool.get_offset(Offset(5)), OffsetResult::TooLarge));
        assert!(matches!(
            pool.get_offset(Offset(0)),
            OffsetResult::InvalidOffset(0)
        ));
    }

    #[test]
    fn pop_and_clear_restore_offsets() {
        let mut stack: OffsetVec<Entry> = OffsetVec::new();
        stack.push(Entry::Wide(1));
        stack.push(Entry::Narrow(2));
        assert_eq!(stack.pop(), Some((Offset(2), 1, Entry::Narrow(2))));
        assert_eq!(stack.offset_len(), Offset(2));
        assert_eq!(stack.last(), Some(&Entry::Wide(1)));

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.offset_len(), Offset(0));
        assert_eq!(stack.pop(), None);
    }
}
